//! SurrealDB implementation of [`PermissionRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::models::permission::Permission;
use vitrine_core::repository::PermissionRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    record_id: String,
    key: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl PermissionRow {
    fn try_into_permission(self) -> Result<Permission, DbError> {
        Ok(Permission {
            id: parse_uuid("permission", "id", &self.record_id)?,
            key: self.key,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn ensure_catalog(&self, entries: &[(&str, &str)]) -> VitrineResult<u64> {
        let current: HashMap<String, String> = self
            .list()
            .await?
            .into_iter()
            .map(|p| (p.key, p.name))
            .collect();

        let mut inserted = 0;
        for (key, name) in entries {
            match current.get(*key) {
                None => {
                    self.db
                        .query(
                            "CREATE type::record('permission', $id) SET \
                             key = $key, name = $name",
                        )
                        .bind(("id", Uuid::new_v4().to_string()))
                        .bind(("key", key.to_string()))
                        .bind(("name", name.to_string()))
                        .await
                        .map_err(DbError::from)?
                        .check()
                        .map_err(|e| DbError::statement("permission", e))?;
                    inserted += 1;
                }
                Some(existing) if existing != name => {
                    self.db
                        .query("UPDATE permission SET name = $name WHERE key = $key RETURN NONE")
                        .bind(("key", key.to_string()))
                        .bind(("name", name.to_string()))
                        .await
                        .map_err(DbError::from)?
                        .check()
                        .map_err(|e| DbError::statement("permission", e))?;
                }
                Some(_) => {}
            }
        }
        Ok(inserted)
    }

    async fn list(&self) -> VitrineResult<Vec<Permission>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM permission ORDER BY key ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(PermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn existing_keys(&self, keys: &[String]) -> VitrineResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query("SELECT VALUE key FROM permission WHERE key IN $keys")
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(DbError::from)?;

        let found: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(found)
    }
}
