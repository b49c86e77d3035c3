//! SurrealDB implementation of [`RoleRepository`].
//!
//! Permission assignments live in `role_permission` rows keyed by role id
//! and permission key; every multi-statement write runs in one transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::models::role::{CreateRole, Role, UpdateRole};
use vitrine_core::repository::RoleRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    tenant_id: String,
    key: String,
    name: String,
    description: String,
    builtin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid("role", "id", &self.record_id)?,
            tenant_id: parse_uuid("role", "tenant_id", &self.tenant_id)?,
            key: self.key,
            name: self.name,
            description: self.description,
            builtin: self.builtin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// `role_permission` rows for one role, deduplicated.
fn grants(tenant_id: Uuid, role_id: Uuid, keys: &[String]) -> Value {
    let unique: BTreeSet<&String> = keys.iter().collect();
    Value::Array(
        unique
            .into_iter()
            .map(|key| {
                json!({
                    "tenant_id": tenant_id.to_string(),
                    "role_id": role_id.to_string(),
                    "permission_key": key,
                })
            })
            .collect(),
    )
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> VitrineResult<Role> {
        let id = Uuid::new_v4();
        let insert = if input.permission_keys.is_empty() {
            ""
        } else {
            "INSERT INTO role_permission $grants RETURN NONE;"
        };
        let query = format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('role', $id) SET \
             tenant_id = $tenant_id, key = $key, name = $name, \
             description = $description, builtin = $builtin RETURN NONE; \
             {insert} \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("key", input.key))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("builtin", input.builtin))
            .bind(("grants", grants(input.tenant_id, id, &input.permission_keys)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("role", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::record('role', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_key(&self, tenant_id: Uuid, key: &str) -> VitrineResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id AND key = $key LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(RoleRow::try_into_role)
            .transpose()?)
    }

    async fn list(&self, tenant_id: Uuid) -> VitrineResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(RoleRow::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateRole) -> VitrineResult<Role> {
        self.get_by_id(tenant_id, id).await?;

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE tenant_id = $tenant_id RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("role", e))?;

        self.get_by_id(tenant_id, id).await
    }

    async fn replace_permissions(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        keys: &[String],
    ) -> VitrineResult<()> {
        self.get_by_id(tenant_id, id).await?;

        let insert = if keys.is_empty() {
            ""
        } else {
            "INSERT INTO role_permission $grants RETURN NONE;"
        };
        let query = format!(
            "BEGIN TRANSACTION; \
             DELETE role_permission WHERE tenant_id = $tenant_id AND role_id = $id; \
             {insert} \
             UPDATE type::record('role', $id) SET updated_at = time::now() RETURN NONE; \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("grants", grants(tenant_id, id, keys)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("role_permission", e))?;

        Ok(())
    }

    async fn permission_keys(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<Vec<String>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE permission_key FROM role_permission \
                 WHERE tenant_id = $tenant_id AND role_id = $id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut keys: Vec<String> = result.take(0).map_err(DbError::from)?;
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<()> {
        self.get_by_id(tenant_id, id).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE role_permission WHERE tenant_id = $tenant_id AND role_id = $id; \
                 DELETE type::record('role', $id) WHERE tenant_id = $tenant_id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("role", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_are_deduplicated() {
        let t = Uuid::new_v4();
        let r = Uuid::new_v4();
        let rows = grants(
            t,
            r,
            &["product.write".into(), "product.read".into(), "product.write".into()],
        );
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["permission_key"], "product.read");
        assert_eq!(rows[0]["role_id"], r.to_string());
    }
}
