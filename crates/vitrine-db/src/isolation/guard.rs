//! Guard over the tenant-less handle.
//!
//! Catches code paths that reach tenant-scoped tables without first
//! acquiring a scoped handle. Independent of [`super::ScopedClient`].

use std::fmt;
use std::sync::Arc;

use tracing::warn;
use vitrine_core::error::{VitrineError, VitrineResult};
use vitrine_core::query::{
    Aggregate, DataClient, Entity, FindArgs, Filter, GroupCount, Operation, Record, UniqueKey,
};

use super::config::{GuardMode, IsolationConfig};

/// An unscoped access to a tenant-scoped entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardEvent {
    pub entity: Entity,
    pub operation: Operation,
}

/// Instrumentation hook called for every event in warn mode.
pub type GuardObserver = Arc<dyn Fn(&GuardEvent) + Send + Sync>;

#[derive(Clone)]
pub struct UnscopedGuard<D> {
    inner: D,
    config: Arc<IsolationConfig>,
    observer: Option<GuardObserver>,
}

impl<D> fmt::Debug for UnscopedGuard<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnscopedGuard")
            .field("mode", &self.config.guard_mode)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl<D: DataClient> UnscopedGuard<D> {
    pub fn new(inner: D, config: Arc<IsolationConfig>) -> Self {
        Self {
            inner,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: GuardObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn check(&self, entity: Entity, operation: Operation) -> VitrineResult<()> {
        if !self.config.is_scoped(entity) {
            return Ok(());
        }
        match self.config.guard_mode {
            GuardMode::Off => Ok(()),
            GuardMode::Warn => {
                warn!(
                    entity = %entity,
                    operation = %operation,
                    "Tenant-scoped entity accessed through the unscoped handle"
                );
                if let Some(observer) = &self.observer {
                    observer(&GuardEvent { entity, operation });
                }
                Ok(())
            }
            GuardMode::Strict => Err(VitrineError::ScopeViolation {
                entity: entity.to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}

impl<D: DataClient> DataClient for UnscopedGuard<D> {
    async fn find_many(&self, entity: Entity, args: FindArgs) -> VitrineResult<Vec<Record>> {
        self.check(entity, Operation::FindMany)?;
        self.inner.find_many(entity, args).await
    }

    async fn find_first(&self, entity: Entity, args: FindArgs) -> VitrineResult<Option<Record>> {
        self.check(entity, Operation::FindFirst)?;
        self.inner.find_first(entity, args).await
    }

    async fn find_unique(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Option<Record>> {
        self.check(entity, Operation::FindUnique)?;
        self.inner.find_unique(entity, key).await
    }

    async fn count(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        self.check(entity, Operation::Count)?;
        self.inner.count(entity, filter).await
    }

    async fn aggregate(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Aggregate> {
        self.check(entity, Operation::Aggregate)?;
        self.inner.aggregate(entity, filter, field).await
    }

    async fn group_count(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Vec<GroupCount>> {
        self.check(entity, Operation::GroupCount)?;
        self.inner.group_count(entity, filter, field).await
    }

    async fn create(&self, entity: Entity, data: Record) -> VitrineResult<Record> {
        self.check(entity, Operation::Create)?;
        self.inner.create(entity, data).await
    }

    async fn create_many(&self, entity: Entity, data: Vec<Record>) -> VitrineResult<u64> {
        self.check(entity, Operation::CreateMany)?;
        self.inner.create_many(entity, data).await
    }

    async fn update(&self, entity: Entity, key: UniqueKey, data: Record) -> VitrineResult<Record> {
        self.check(entity, Operation::Update)?;
        self.inner.update(entity, key, data).await
    }

    async fn update_many(&self, entity: Entity, filter: Filter, data: Record) -> VitrineResult<u64> {
        self.check(entity, Operation::UpdateMany)?;
        self.inner.update_many(entity, filter, data).await
    }

    async fn delete(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Record> {
        self.check(entity, Operation::Delete)?;
        self.inner.delete(entity, key).await
    }

    async fn delete_many(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        self.check(entity, Operation::DeleteMany)?;
        self.inner.delete_many(entity, filter).await
    }

    async fn upsert(
        &self,
        entity: Entity,
        key: UniqueKey,
        create: Record,
        update: Record,
    ) -> VitrineResult<Record> {
        self.check(entity, Operation::Upsert)?;
        self.inner.upsert(entity, key, create, update).await
    }
}
