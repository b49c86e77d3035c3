//! SurrealDB store behind [`DataClient`].
//!
//! Rows live in SCHEMALESS tables. The public `id` is persisted in the
//! `uid` column and SurrealDB's record link is omitted from every read.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use vitrine_core::error::{VitrineError, VitrineResult};
use vitrine_core::query::{
    Aggregate, DataClient, Entity, FindArgs, Filter, GroupCount, ID_FIELD, Record, UniqueKey,
    validate_field,
};

use crate::error::DbError;
use crate::sql::{self, UID_COLUMN};

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Current time in the fixed-width form stored on entity rows, so that
/// lexical and chronological order agree.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Raw access to the shared entity tables. Applies no tenant constraint.
pub struct SurrealDataClient<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealDataClient<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealDataClient<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(&self, entity: Entity, args: &FindArgs) -> VitrineResult<Vec<Record>> {
        let table = entity.table();
        let cond = sql::compile(&args.filter)?;
        let query = format!(
            "SELECT * OMIT id FROM {table} WHERE {}{}",
            cond.clause,
            sql::paging(args)?
        );
        let result = self
            .db
            .query(query)
            .bind((sql::PARAMS, cond.params_value()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::statement(table, e))?;
        let rows: Vec<Value> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| from_stored(table, row))
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn matching_uids(&self, entity: Entity, filter: &Filter) -> VitrineResult<Vec<String>> {
        let table = entity.table();
        let cond = sql::compile(filter)?;
        let query = format!("SELECT VALUE {UID_COLUMN} FROM {table} WHERE {}", cond.clause);
        let result = self
            .db
            .query(query)
            .bind((sql::PARAMS, cond.params_value()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::statement(table, e))?;
        let uids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(uids)
    }

    async fn merge_uids(
        &self,
        entity: Entity,
        uids: Vec<String>,
        data: Record,
    ) -> VitrineResult<()> {
        let table = entity.table();
        let query = format!("UPDATE {table} MERGE $data WHERE {UID_COLUMN} IN $ids RETURN NONE");
        self.db
            .query(query)
            .bind(("data", Value::Object(data)))
            .bind(("ids", uids))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement(table, e))?;
        Ok(())
    }

    async fn remove_uids(&self, entity: Entity, uids: Vec<String>) -> VitrineResult<()> {
        let table = entity.table();
        let query = format!("DELETE {table} WHERE {UID_COLUMN} IN $ids RETURN NONE");
        self.db
            .query(query)
            .bind(("ids", uids))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement(table, e))?;
        Ok(())
    }

    async fn existing(&self, entity: Entity, key: &UniqueKey) -> VitrineResult<Record> {
        key.validate()?;
        self.find_first(entity, FindArgs::new(key.to_filter()))
            .await?
            .ok_or_else(|| VitrineError::not_found(entity.table(), key.describe()))
    }
}

/// Validates the payload and maps public field names to stored columns.
fn to_stored(data: Record) -> VitrineResult<Record> {
    let mut stored = Record::new();
    for (field, value) in data {
        if field == UID_COLUMN {
            return Err(VitrineError::validation(field, "reserved field name"));
        }
        let col = sql::column(&field)?;
        stored.insert(col, value);
    }
    Ok(stored)
}

fn from_stored(table: &str, row: Value) -> Result<Record, DbError> {
    let Value::Object(mut record) = row else {
        return Err(DbError::decode(table, "row is not an object"));
    };
    if let Some(uid) = record.remove(UID_COLUMN) {
        record.insert(ID_FIELD.into(), uid);
    }
    Ok(record)
}

/// Fills `id`, `created_at` and `updated_at` when the caller left them out.
fn stamp_new(mut data: Record) -> VitrineResult<Record> {
    match data.get(ID_FIELD) {
        None | Some(Value::Null) => {
            data.insert(ID_FIELD.into(), Value::String(Uuid::new_v4().to_string()));
        }
        Some(Value::String(_)) => {}
        Some(_) => return Err(VitrineError::validation(ID_FIELD, "must be a string")),
    }
    let now = timestamp();
    data.entry("created_at")
        .or_insert_with(|| Value::String(now.clone()));
    data.entry("updated_at").or_insert_with(|| Value::String(now));
    Ok(data)
}

fn stamp_update(mut data: Record) -> VitrineResult<Record> {
    if data.contains_key(ID_FIELD) {
        return Err(VitrineError::validation(ID_FIELD, "ids are immutable"));
    }
    data.entry("updated_at")
        .or_insert_with(|| Value::String(timestamp()));
    Ok(data)
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

impl<C: Connection> DataClient for SurrealDataClient<C> {
    async fn find_many(&self, entity: Entity, args: FindArgs) -> VitrineResult<Vec<Record>> {
        self.select(entity, &args).await
    }

    async fn find_first(&self, entity: Entity, args: FindArgs) -> VitrineResult<Option<Record>> {
        let rows = self.select(entity, &args.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_unique(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Option<Record>> {
        key.validate()?;
        self.find_first(entity, FindArgs::new(key.to_filter())).await
    }

    async fn count(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        let table = entity.table();
        let cond = sql::compile(&filter)?;
        let query = format!(
            "SELECT count() AS total FROM {table} WHERE {} GROUP ALL",
            cond.clause
        );
        let result = self
            .db
            .query(query)
            .bind((sql::PARAMS, cond.params_value()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::statement(table, e))?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn aggregate(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Aggregate> {
        let table = entity.table();
        let col = sql::column(&field)?;
        let cond = sql::compile(&filter)?;
        let query = format!(
            "SELECT count() AS count, math::sum({col}) AS sum, \
             math::min({col}) AS min, math::max({col}) AS max \
             FROM {table} WHERE ({}) AND {col} != NONE AND {col} != NULL GROUP ALL",
            cond.clause
        );
        let result = self
            .db
            .query(query)
            .bind((sql::PARAMS, cond.params_value()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::statement(table, e))?;
        let rows: Vec<Value> = result.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(Aggregate::default());
        };
        Ok(Aggregate {
            count: row.get("count").and_then(Value::as_u64).unwrap_or(0),
            sum: number(row.get("sum")).unwrap_or(0.0),
            min: number(row.get("min")),
            max: number(row.get("max")),
        })
    }

    async fn group_count(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> VitrineResult<Vec<GroupCount>> {
        let table = entity.table();
        let col = sql::column(&field)?;
        let cond = sql::compile(&filter)?;
        let query = format!(
            "SELECT {col}, count() AS count FROM {table} WHERE {} GROUP BY {col}",
            cond.clause
        );
        let result = self
            .db
            .query(query)
            .bind((sql::PARAMS, cond.params_value()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::statement(table, e))?;
        let rows: Vec<Value> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| GroupCount {
                key: row.get(&col).cloned().unwrap_or(Value::Null),
                count: row.get("count").and_then(Value::as_u64).unwrap_or(0),
            })
            .collect())
    }

    async fn create(&self, entity: Entity, data: Record) -> VitrineResult<Record> {
        let table = entity.table();
        let record = stamp_new(data)?;
        let stored = to_stored(record.clone())?;
        let query = format!("CREATE {table} CONTENT $data RETURN NONE");
        self.db
            .query(query)
            .bind(("data", Value::Object(stored)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement(table, e))?;
        debug!(table, id = ?record.get(ID_FIELD), "Created record");
        Ok(record)
    }

    async fn create_many(&self, entity: Entity, data: Vec<Record>) -> VitrineResult<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        let table = entity.table();
        let rows = data
            .into_iter()
            .map(|r| stamp_new(r).and_then(to_stored).map(Value::Object))
            .collect::<VitrineResult<Vec<_>>>()?;
        let count = rows.len() as u64;
        let query = format!("INSERT INTO {table} $rows RETURN NONE");
        self.db
            .query(query)
            .bind(("rows", Value::Array(rows)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement(table, e))?;
        debug!(table, count, "Created records");
        Ok(count)
    }

    async fn update(&self, entity: Entity, key: UniqueKey, data: Record) -> VitrineResult<Record> {
        let current = self.existing(entity, &key).await?;
        let Some(Value::String(uid)) = current.get(ID_FIELD).cloned() else {
            return Err(DbError::decode(entity.table(), "row without id").into());
        };
        let patch = to_stored(stamp_update(data)?)?;
        self.merge_uids(entity, vec![uid.clone()], patch).await?;
        self.existing(entity, &UniqueKey::Id(uid)).await
    }

    async fn update_many(&self, entity: Entity, filter: Filter, data: Record) -> VitrineResult<u64> {
        let patch = to_stored(stamp_update(data)?)?;
        let uids = self.matching_uids(entity, &filter).await?;
        if uids.is_empty() {
            return Ok(0);
        }
        let count = uids.len() as u64;
        self.merge_uids(entity, uids, patch).await?;
        debug!(table = entity.table(), count, "Updated records");
        Ok(count)
    }

    async fn delete(&self, entity: Entity, key: UniqueKey) -> VitrineResult<Record> {
        let current = self.existing(entity, &key).await?;
        let Some(Value::String(uid)) = current.get(ID_FIELD).cloned() else {
            return Err(DbError::decode(entity.table(), "row without id").into());
        };
        self.remove_uids(entity, vec![uid]).await?;
        Ok(current)
    }

    async fn delete_many(&self, entity: Entity, filter: Filter) -> VitrineResult<u64> {
        let uids = self.matching_uids(entity, &filter).await?;
        if uids.is_empty() {
            return Ok(0);
        }
        let count = uids.len() as u64;
        self.remove_uids(entity, uids).await?;
        debug!(table = entity.table(), count, "Deleted records");
        Ok(count)
    }

    async fn upsert(
        &self,
        entity: Entity,
        key: UniqueKey,
        create: Record,
        update: Record,
    ) -> VitrineResult<Record> {
        match self.find_unique(entity, key.clone()).await? {
            Some(row) if update.is_empty() => Ok(row),
            Some(_) => self.update(entity, key, update).await,
            None => self.create(entity, with_key_fields(create, &key)?).await,
        }
    }
}

/// The create payload of an upsert, completed with the lookup key.
pub(crate) fn with_key_fields(mut data: Record, key: &UniqueKey) -> VitrineResult<Record> {
    match key {
        UniqueKey::Id(id) => {
            data.insert(ID_FIELD.into(), Value::String(id.clone()));
        }
        UniqueKey::Fields(pairs) => {
            for (field, value) in pairs {
                validate_field(field)?;
                data.entry(field.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitrine_core::query::into_record;

    #[test]
    fn stored_form_swaps_id_for_uid() {
        let stored = to_stored(into_record(json!({"id": "a", "slug": "hats"}))).unwrap();
        assert_eq!(Value::Object(stored.clone()), json!({"uid": "a", "slug": "hats"}));
        let back = from_stored("brand", Value::Object(stored)).unwrap();
        assert_eq!(Value::Object(back), json!({"id": "a", "slug": "hats"}));
    }

    #[test]
    fn uid_is_reserved() {
        assert!(to_stored(into_record(json!({"uid": "x"}))).is_err());
        assert!(to_stored(into_record(json!({"bad-name": 1}))).is_err());
    }

    #[test]
    fn new_rows_get_id_and_timestamps() {
        let rec = stamp_new(into_record(json!({"slug": "hats"}))).unwrap();
        assert!(Uuid::parse_str(rec["id"].as_str().unwrap()).is_ok());
        assert_eq!(rec["created_at"], rec["updated_at"]);

        let kept = stamp_new(into_record(json!({"id": "fixed"}))).unwrap();
        assert_eq!(kept["id"], "fixed");
        assert!(stamp_new(into_record(json!({"id": 7}))).is_err());
    }

    #[test]
    fn updates_cannot_change_id() {
        assert!(stamp_update(into_record(json!({"id": "other"}))).is_err());
        let patch = stamp_update(into_record(json!({"name": "x"}))).unwrap();
        assert!(patch.contains_key("updated_at"));
    }

    #[test]
    fn key_fields_complete_create_payload() {
        let key = UniqueKey::field("tenant_id", "t1");
        let data = with_key_fields(into_record(json!({"theme": "dark"})), &key).unwrap();
        assert_eq!(Value::Object(data), json!({"theme": "dark", "tenant_id": "t1"}));
        let data = with_key_fields(Record::new(), &UniqueKey::id("p1")).unwrap();
        assert_eq!(data["id"], "p1");
    }

    #[test]
    fn timestamps_sort_lexically() {
        let a = timestamp();
        let b = timestamp();
        assert!(a <= b);
        assert!(a.ends_with('Z'));
    }
}
