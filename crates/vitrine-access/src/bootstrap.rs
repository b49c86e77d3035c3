//! Idempotent tenant bootstrap: built-in roles, default branding and an
//! optional owner membership.

use serde_json::json;
use tracing::info;
use uuid::Uuid;
use vitrine_core::error::{VitrineError, VitrineResult};
use vitrine_core::models::audit::AuditEvent;
use vitrine_core::models::branding::Branding;
use vitrine_core::models::membership::{CreateMembership, Membership};
use vitrine_core::models::role::{BuiltinRole, CreateRole, Role, UpdateRole};
use vitrine_core::query::{DataClient, Entity, Record, TENANT_FIELD, TenantScopes, UniqueKey};
use vitrine_core::repository::{
    MembershipRepository, RoleRepository, TenantRepository, UserRepository,
};

use crate::audit::{self, SYSTEM_ACTOR};

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub tenant_id: Uuid,
    /// The four built-in roles, in [`BuiltinRole::ALL`] order.
    pub roles: Vec<Role>,
    pub roles_created: usize,
    pub branding: Record,
    pub owner_membership: Option<Membership>,
}

impl BootstrapReport {
    pub fn role(&self, builtin: BuiltinRole) -> Option<&Role> {
        self.roles.iter().find(|r| r.key == builtin.key())
    }
}

pub struct TenantBootstrap<T, U, M, R, S>
where
    T: TenantRepository,
    U: UserRepository,
    M: MembershipRepository,
    R: RoleRepository,
    S: TenantScopes,
{
    tenants: T,
    users: U,
    members: M,
    roles: R,
    data: S,
}

impl<T, U, M, R, S> TenantBootstrap<T, U, M, R, S>
where
    T: TenantRepository,
    U: UserRepository,
    M: MembershipRepository,
    R: RoleRepository,
    S: TenantScopes,
{
    pub fn new(tenants: T, users: U, members: M, roles: R, data: S) -> Self {
        Self {
            tenants,
            users,
            members,
            roles,
            data,
        }
    }

    /// Safe to run repeatedly. Existing built-in roles get their default
    /// name and description back; their permission sets are left alone.
    pub async fn bootstrap_tenant(
        &self,
        tenant_id: Uuid,
        owner: Option<Uuid>,
    ) -> VitrineResult<BootstrapReport> {
        let tenant = self.tenants.get_by_id(tenant_id).await?;

        let mut roles = Vec::with_capacity(BuiltinRole::ALL.len());
        let mut roles_created = 0;
        for builtin in BuiltinRole::ALL {
            let (role, created) = self.ensure_role(tenant.id, builtin).await?;
            roles_created += usize::from(created);
            roles.push(role);
        }

        let scope = self.data.for_tenant(tenant.id);
        let branding = scope
            .upsert(
                Entity::TenantBranding,
                UniqueKey::field(TENANT_FIELD, tenant.id.to_string()),
                Branding::default().into_record(),
                Record::new(),
            )
            .await?;

        let owner_membership = match owner {
            Some(user_id) => {
                let owner_role = roles
                    .iter()
                    .find(|r| r.is_owner())
                    .map(|r| r.id)
                    .ok_or_else(|| VitrineError::Internal("OWNER role missing".into()))?;
                Some(self.ensure_owner(tenant.id, user_id, owner_role).await?)
            }
            None => None,
        };

        audit::record(
            &scope,
            AuditEvent::new(
                SYSTEM_ACTOR,
                "tenant.bootstrap",
                json!({
                    "roles_created": roles_created,
                    "owner_id": owner.map(|id| id.to_string()),
                }),
            ),
        )
        .await;

        info!(
            tenant_id = %tenant.id,
            slug = %tenant.slug,
            roles_created,
            owner = ?owner,
            "tenant bootstrapped"
        );

        Ok(BootstrapReport {
            tenant_id: tenant.id,
            roles,
            roles_created,
            branding,
            owner_membership,
        })
    }

    async fn ensure_role(
        &self,
        tenant_id: Uuid,
        builtin: BuiltinRole,
    ) -> VitrineResult<(Role, bool)> {
        let name = builtin.default_name();
        let description = builtin.default_description();

        match self.roles.get_by_key(tenant_id, builtin.key()).await? {
            Some(role) if role.name == name && role.description == description => {
                Ok((role, false))
            }
            Some(role) => {
                let role = self
                    .roles
                    .update(
                        tenant_id,
                        role.id,
                        UpdateRole {
                            name: Some(name.into()),
                            description: Some(description.into()),
                        },
                    )
                    .await?;
                Ok((role, false))
            }
            None => {
                let role = self
                    .roles
                    .create(CreateRole {
                        tenant_id,
                        key: builtin.key().into(),
                        name: name.into(),
                        description: description.into(),
                        builtin: true,
                        permission_keys: builtin.permission_keys(),
                    })
                    .await?;
                Ok((role, true))
            }
        }
    }

    async fn ensure_owner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        owner_role: Uuid,
    ) -> VitrineResult<Membership> {
        let user = self.users.get_by_id(user_id).await?;
        match self.members.get_for_user(tenant_id, user.id).await? {
            Some(m) if m.role_id == owner_role => Ok(m),
            Some(m) => {
                self.members
                    .change_role_guarded(tenant_id, m.id, owner_role)
                    .await
            }
            None => {
                self.members
                    .create(CreateMembership {
                        tenant_id,
                        user_id: user.id,
                        role_id: owner_role,
                    })
                    .await
            }
        }
    }
}
