//! Role management within one tenant.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::identity::Identity;
use vitrine_core::models::audit::AuditEvent;
use vitrine_core::models::permission::keys;
use vitrine_core::models::role::{BuiltinRole, CreateRole, Role, UpdateRole};
use vitrine_core::query::TenantScopes;
use vitrine_core::repository::{MembershipRepository, PermissionRepository, RoleRepository};

use crate::audit;
use crate::error::AccessError;
use crate::invariants;
use crate::permission::PermissionEngine;

/// A custom role to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permission_keys: Vec<String>,
}

/// Partial update. `permission_keys` replaces the whole set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permission_keys: Option<Vec<String>>,
}

impl RoleUpdate {
    fn touches_metadata(&self) -> bool {
        self.name.is_some() || self.description.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permission_keys: Vec<String>,
    pub member_count: u64,
}

/// Prefilled form values for creating a copy of an existing role. The key
/// is left empty so the caller must choose a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDraft {
    pub key: String,
    pub name: String,
    pub description: String,
    pub permission_keys: Vec<String>,
}

impl From<RoleDraft> for NewRole {
    fn from(draft: RoleDraft) -> Self {
        Self {
            key: draft.key,
            name: draft.name,
            description: draft.description,
            permission_keys: draft.permission_keys,
        }
    }
}

pub struct RoleService<M, R, P, S>
where
    M: MembershipRepository,
    R: RoleRepository,
    P: PermissionRepository,
    S: TenantScopes,
{
    engine: PermissionEngine<M, R>,
    permissions: P,
    data: S,
}

impl<M, R, P, S> RoleService<M, R, P, S>
where
    M: MembershipRepository,
    R: RoleRepository,
    P: PermissionRepository,
    S: TenantScopes,
{
    pub fn new(engine: PermissionEngine<M, R>, permissions: P, data: S) -> Self {
        Self {
            engine,
            permissions,
            data,
        }
    }

    pub async fn create_role(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        input: NewRole,
    ) -> VitrineResult<Role> {
        self.engine
            .require(actor, keys::ROLE_WRITE, Some(tenant_id))
            .await?;

        let key = input.key.trim().to_string();
        invariants::validate_role_key(&key)?;
        let name = required_name(&input.name)?;
        let existing = self.engine.roles().get_by_key(tenant_id, &key).await?;
        invariants::assert_key_unique(&key, existing.as_ref())?;
        self.check_catalog(&input.permission_keys).await?;

        let role = self
            .engine
            .roles()
            .create(CreateRole {
                tenant_id,
                key,
                name,
                description: input.description,
                builtin: false,
                permission_keys: input.permission_keys.clone(),
            })
            .await?;

        self.audit(
            tenant_id,
            actor,
            "role.create",
            json!({
                "role_id": role.id.to_string(),
                "key": role.key,
                "permission_keys": input.permission_keys,
            }),
        )
        .await;
        Ok(role)
    }

    pub async fn update_role(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        role_id: Uuid,
        update: RoleUpdate,
    ) -> VitrineResult<Role> {
        self.engine
            .require(actor, keys::ROLE_WRITE, Some(tenant_id))
            .await?;

        let roles = self.engine.roles();
        let role = roles.get_by_id(tenant_id, role_id).await?;
        invariants::assert_role_mutable(&role, update.permission_keys.is_some())?;
        let name = update.name.as_deref().map(required_name).transpose()?;
        if let Some(keys) = &update.permission_keys {
            self.check_catalog(keys).await?;
        }

        if update.touches_metadata() {
            roles
                .update(
                    tenant_id,
                    role_id,
                    UpdateRole {
                        name,
                        description: update.description.clone(),
                    },
                )
                .await?;
        }
        if let Some(keys) = &update.permission_keys {
            roles.replace_permissions(tenant_id, role_id, keys).await?;
        }
        let updated = roles.get_by_id(tenant_id, role_id).await?;

        self.audit(
            tenant_id,
            actor,
            "role.update",
            json!({
                "role_id": role_id.to_string(),
                "key": updated.key,
                "name": update.name,
                "description": update.description,
                "permission_keys": update.permission_keys,
            }),
        )
        .await;
        Ok(updated)
    }

    pub async fn delete_role(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> VitrineResult<()> {
        self.engine
            .require(actor, keys::ROLE_WRITE, Some(tenant_id))
            .await?;

        let roles = self.engine.roles();
        let members = self.engine.members();
        let role = roles.get_by_id(tenant_id, role_id).await?;
        let in_use = members.count_with_role(tenant_id, role.id).await?;
        let owners = if role.is_owner() {
            match roles.get_by_key(tenant_id, BuiltinRole::Owner.key()).await? {
                Some(owner) => members.count_with_role(tenant_id, owner.id).await?,
                None => 0,
            }
        } else {
            0
        };
        invariants::assert_role_deletable(&role, in_use, owners)?;

        roles.delete(tenant_id, role_id).await?;
        self.audit(
            tenant_id,
            actor,
            "role.delete",
            json!({ "role_id": role_id.to_string(), "key": role.key }),
        )
        .await;
        Ok(())
    }

    pub async fn list_roles(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
    ) -> VitrineResult<Vec<RoleWithPermissions>> {
        self.engine
            .require_any(actor, &[keys::ROLE_READ, keys::ROLE_WRITE], Some(tenant_id))
            .await?;

        let roles = self.engine.roles();
        let mut out = Vec::new();
        for role in roles.list(tenant_id).await? {
            let permission_keys = roles.permission_keys(tenant_id, role.id).await?;
            let member_count = self
                .engine
                .members()
                .count_with_role(tenant_id, role.id)
                .await?;
            out.push(RoleWithPermissions {
                role,
                permission_keys,
                member_count,
            });
        }
        Ok(out)
    }

    /// Defaults for a new role copied from `role_id`. Nothing is written.
    pub async fn clone_role_draft(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> VitrineResult<RoleDraft> {
        self.engine
            .require_any(actor, &[keys::ROLE_READ, keys::ROLE_WRITE], Some(tenant_id))
            .await?;

        let roles = self.engine.roles();
        let role = roles.get_by_id(tenant_id, role_id).await?;
        let permission_keys = roles.permission_keys(tenant_id, role_id).await?;
        Ok(RoleDraft {
            key: String::new(),
            name: format!("{} (copy)", role.name),
            description: role.description,
            permission_keys,
        })
    }

    async fn check_catalog(&self, requested: &[String]) -> VitrineResult<()> {
        let known = if requested.is_empty() {
            Vec::new()
        } else {
            self.permissions.existing_keys(requested).await?
        };
        invariants::assert_permission_keys_known(requested, &known)?;
        Ok(())
    }

    async fn audit(
        &self,
        tenant_id: Uuid,
        actor: &Identity,
        action: &str,
        metadata: serde_json::Value,
    ) {
        let scope = self.data.for_tenant(tenant_id);
        audit::record(&scope, AuditEvent::new(actor.user_id, action, metadata)).await;
    }
}

fn required_name(name: &str) -> Result<String, AccessError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccessError::Required { field: "name" });
    }
    Ok(name.to_string())
}
