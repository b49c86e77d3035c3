//! Tenant-bound decorator over a [`DataClient`].

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;
use vitrine_core::error::{VitrineError, VitrineResult};
use vitrine_core::query::{
    Aggregate, DataClient, Entity, FindArgs, Filter, GroupCount, ID_FIELD, Operation, Record,
    TENANT_FIELD, UniqueKey,
};

use super::config::{IsolationConfig, LookupPolicy};
use crate::client::with_key_fields;

/// A data-access handle bound to one tenant.
///
/// Every operation on a tenant-scoped entity is constrained to
/// `tenant_id = T`. Rows of other tenants behave exactly like missing rows.
/// Construct one per request; the tenant id is fixed for the handle's life.
#[derive(Clone)]
pub struct ScopedClient<D> {
    inner: D,
    tenant_id: Uuid,
    tenant: String,
    config: Arc<IsolationConfig>,
}

impl<D: DataClient> ScopedClient<D> {
    pub fn new(inner: D, tenant_id: Uuid, config: Arc<IsolationConfig>) -> Self {
        Self {
            inner,
            tenant_id,
            tenant: tenant_id.to_string(),
            config,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn scoped(&self, entity: Entity) -> bool {
        self.config.is_scoped(entity)
    }

    fn constrain(&self, filter: Filter) -> Filter {
        Filter::eq(TENANT_FIELD, self.tenant.clone()).and(filter)
    }

    fn constrain_args(&self, mut args: FindArgs) -> FindArgs {
        args.filter = self.constrain(args.filter);
        args
    }

    fn cross_tenant(&self, entity: Entity, attempted: &Value) -> VitrineError {
        VitrineError::CrossTenantWrite {
            entity: entity.to_string(),
            scope: self.tenant.clone(),
            attempted: match attempted {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Writes the scope's tenant into a new row, rejecting a conflicting one.
    fn stamp(&self, entity: Entity, mut data: Record) -> VitrineResult<Record> {
        match data.get(TENANT_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::String(t)) if *t == self.tenant => {}
            Some(other) => return Err(self.cross_tenant(entity, other)),
        }
        data.insert(TENANT_FIELD.into(), Value::String(self.tenant.clone()));
        Ok(data)
    }

    /// The tenant of an existing row is immutable: an equal value is dropped,
    /// anything else is a cross-tenant write.
    fn strip_tenant(&self, entity: Entity, mut data: Record) -> VitrineResult<Record> {
        match data.remove(TENANT_FIELD) {
            None => {}
            Some(Value::String(t)) if t == self.tenant => {}
            Some(other) => return Err(self.cross_tenant(entity, &other)),
        }
        Ok(data)
    }

    /// Reads the row matching `key` inside the scope, or `NotFound`.
    async fn existing(&self, entity: Entity, key: &UniqueKey) -> VitrineResult<Record> {
        key.validate()?;
        self.inner
            .find_first(entity, FindArgs::new(self.constrain(key.to_filter())))
            .await?
            .ok_or_else(|| VitrineError::not_found(entity.table(), key.describe()))
    }

    /// Narrows `key` to the id of the one row it resolves to.
    fn row_key(entity: Entity, row: &Record) -> VitrineResult<UniqueKey> {
        row.get(ID_FIELD)
            .and_then(Value::as_str)
            .map(UniqueKey::id)
            .ok_or_else(|| VitrineError::Internal(format!("{entity} row without id")))
    }

    async fn update_existing(
        &self,
        entity: Entity,
        key: &UniqueKey,
        data: Record,
    ) -> VitrineResult<Record> {
        let data = self.strip_tenant(entity, data)?;
        let row = self.existing(entity, key).await?;
        let by_id = Self::row_key(entity, &row)?;
        self.inner
            .update_many(entity, self.constrain(by_id.to_filter()), data)
            .await?;
        self.existing(entity, &by_id).await
    }
}

impl<D: DataClient> DataClient for ScopedClient<D> {
    async fn find_many(&self, entity: Entity, args: FindArgs) -> VitrineResult<Vec<Record>> {
        if !self.scoped(entity) {
            return self.inner.find_many(entity, args).await;
        }
        self.inner.find_many(entity, self.constrain_args(args)).await
    }

    async fn find_first(&self, entity: Entity, args: FindArgs) -> VitrineResult<Option<Record>> {
        if !self.scoped(entity) {
            return self.inner.find_first(entity, args).await;
        }
        self.inner.find_first(entity, self.constrain_args(args)).await
    }

    async fn find_unique(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Option<Record>> {
        if !self.scoped(entity) {
            return self.inner.find_unique(entity, key).await;
        }
        match self.config.lookup_policy {
            LookupPolicy::Inject => {
                key.validate()?;
                self.inner
                    .find_first(entity, FindArgs::new(self.constrain(key.to_filter())))
                    .await
            }
            LookupPolicy::Strict => Err(VitrineError::ScopeViolation {
                entity: entity.to_string(),
                operation: Operation::FindUnique.to_string(),
            }),
        }
    }

    async fn count(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        if !self.scoped(entity) {
            return self.inner.count(entity, filter).await;
        }
        self.inner.count(entity, self.constrain(filter)).await
    }

    async fn aggregate(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Aggregate> {
        let filter = if self.scoped(entity) {
            self.constrain(filter)
        } else {
            filter
        };
        self.inner.aggregate(entity, filter, field).await
    }

    async fn group_count(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Vec<GroupCount>> {
        let filter = if self.scoped(entity) {
            self.constrain(filter)
        } else {
            filter
        };
        self.inner.group_count(entity, filter, field).await
    }

    async fn create(&self, entity: Entity, data: Record) -> VitrineResult<Record> {
        if !self.scoped(entity) {
            return self.inner.create(entity, data).await;
        }
        let data = self.stamp(entity, data)?;
        self.inner.create(entity, data).await
    }

    async fn create_many(&self, entity: Entity, data: Vec<Record>) -> VitrineResult<u64> {
        if !self.scoped(entity) {
            return self.inner.create_many(entity, data).await;
        }
        let rows = data
            .into_iter()
            .map(|row| self.stamp(entity, row))
            .collect::<VitrineResult<Vec<_>>>()?;
        self.inner.create_many(entity, rows).await
    }

    async fn update(&self, entity: Entity, key: UniqueKey, data: Record) -> VitrineResult<Record> {
        if !self.scoped(entity) {
            return self.inner.update(entity, key, data).await;
        }
        self.update_existing(entity, &key, data).await
    }

    async fn update_many(&self, entity: Entity, filter: Filter, data: Record) -> VitrineResult<u64> {
        if !self.scoped(entity) {
            return self.inner.update_many(entity, filter, data).await;
        }
        let data = self.strip_tenant(entity, data)?;
        self.inner
            .update_many(entity, self.constrain(filter), data)
            .await
    }

    async fn delete(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Record> {
        if !self.scoped(entity) {
            return self.inner.delete(entity, key).await;
        }
        let row = self.existing(entity, &key).await?;
        let by_id = Self::row_key(entity, &row)?;
        let deleted = self
            .inner
            .delete_many(entity, self.constrain(by_id.to_filter()))
            .await?;
        if deleted == 0 {
            return Err(VitrineError::not_found(entity.table(), key.describe()));
        }
        Ok(row)
    }

    async fn delete_many(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        if !self.scoped(entity) {
            return self.inner.delete_many(entity, filter).await;
        }
        self.inner.delete_many(entity, self.constrain(filter)).await
    }

    async fn upsert(
        &self,
        entity: Entity,
        key: UniqueKey,
        create: Record,
        update: Record,
    ) -> VitrineResult<Record> {
        if !self.scoped(entity) {
            return self.inner.upsert(entity, key, create, update).await;
        }
        key.validate()?;
        let found = self
            .inner
            .find_first(entity, FindArgs::new(self.constrain(key.to_filter())))
            .await?;
        match found {
            Some(row) if update.is_empty() => Ok(row),
            Some(_) => self.update_existing(entity, &key, update).await,
            None => {
                let data = self.stamp(entity, with_key_fields(create, &key)?)?;
                self.inner.create(entity, data).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitrine_core::query::into_record;

    /// Minimal client used only to exercise the pure helpers.
    struct Nothing;

    impl DataClient for Nothing {
        async fn find_many(&self, _: Entity, _: FindArgs) -> VitrineResult<Vec<Record>> {
            Ok(vec![])
        }
        async fn find_first(&self, _: Entity, _: FindArgs) -> VitrineResult<Option<Record>> {
            Ok(None)
        }
        async fn find_unique(&self, _: Entity, _: UniqueKey) -> VitrineResult<Option<Record>> {
            Ok(None)
        }
        async fn count(&self, _: Entity, _: Filter) -> VitrineResult<u64> {
            Ok(0)
        }
        async fn aggregate(&self, _: Entity, _: Filter, _: String) -> VitrineResult<Aggregate> {
            Ok(Aggregate::default())
        }
        async fn group_count(
            &self,
            _: Entity,
            _: Filter,
            _: String,
        ) -> VitrineResult<Vec<GroupCount>> {
            Ok(vec![])
        }
        async fn create(&self, _: Entity, data: Record) -> VitrineResult<Record> {
            Ok(data)
        }
        async fn create_many(&self, _: Entity, data: Vec<Record>) -> VitrineResult<u64> {
            Ok(data.len() as u64)
        }
        async fn update(&self, e: Entity, k: UniqueKey, _: Record) -> VitrineResult<Record> {
            Err(VitrineError::not_found(e.table(), k.describe()))
        }
        async fn update_many(&self, _: Entity, _: Filter, _: Record) -> VitrineResult<u64> {
            Ok(0)
        }
        async fn delete(&self, e: Entity, k: UniqueKey) -> VitrineResult<Record> {
            Err(VitrineError::not_found(e.table(), k.describe()))
        }
        async fn delete_many(&self, _: Entity, _: Filter) -> VitrineResult<u64> {
            Ok(0)
        }
        async fn upsert(
            &self,
            _: Entity,
            _: UniqueKey,
            create: Record,
            _: Record,
        ) -> VitrineResult<Record> {
            Ok(create)
        }
    }

    fn client(tenant: Uuid) -> ScopedClient<Nothing> {
        ScopedClient::new(Nothing, tenant, Arc::new(IsolationConfig::default()))
    }

    #[test]
    fn stamp_fills_missing_tenant() {
        let t = Uuid::new_v4();
        let c = client(t);
        let rec = c.stamp(Entity::Product, into_record(json!({"slug": "a"}))).unwrap();
        assert_eq!(rec["tenant_id"], json!(t.to_string()));
        let rec = c
            .stamp(Entity::Product, into_record(json!({"tenant_id": null})))
            .unwrap();
        assert_eq!(rec["tenant_id"], json!(t.to_string()));
    }

    #[test]
    fn stamp_rejects_foreign_tenant() {
        let c = client(Uuid::new_v4());
        let other = Uuid::new_v4().to_string();
        let err = c
            .stamp(Entity::Brand, into_record(json!({"tenant_id": other})))
            .unwrap_err();
        assert!(matches!(
            err,
            VitrineError::CrossTenantWrite { attempted, .. } if attempted == other
        ));
        assert!(
            c.stamp(Entity::Brand, into_record(json!({"tenant_id": 5})))
                .is_err()
        );
    }

    #[test]
    fn strip_tenant_drops_equal_value() {
        let t = Uuid::new_v4();
        let c = client(t);
        let rec = c
            .strip_tenant(
                Entity::Product,
                into_record(json!({"tenant_id": t.to_string(), "name": "x"})),
            )
            .unwrap();
        assert!(!rec.contains_key("tenant_id"));
        assert!(
            c.strip_tenant(Entity::Product, into_record(json!({"tenant_id": null})))
                .is_err()
        );
    }

    #[test]
    fn constrain_prepends_tenant_condition() {
        let t = Uuid::new_v4();
        let c = client(t);
        assert_eq!(
            c.constrain(Filter::eq("slug", "a")),
            Filter::And(vec![
                Filter::eq("tenant_id", t.to_string()),
                Filter::eq("slug", "a")
            ])
        );
        assert_eq!(
            c.constrain(Filter::All),
            Filter::eq("tenant_id", t.to_string())
        );
    }
}
