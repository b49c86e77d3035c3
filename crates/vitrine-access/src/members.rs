//! Membership management: adding users to a tenant, moving them between
//! roles and removing them.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::identity::Identity;
use vitrine_core::models::audit::AuditEvent;
use vitrine_core::models::membership::{CreateMembership, Membership};
use vitrine_core::models::permission::keys;
use vitrine_core::models::role::Role;
use vitrine_core::query::TenantScopes;
use vitrine_core::repository::{MembershipRepository, RoleRepository, UserRepository};

use crate::audit;
use crate::invariants;
use crate::permission::PermissionEngine;

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub membership: Membership,
    pub role_key: String,
    pub role_name: String,
}

pub struct MembershipService<M, R, U, S>
where
    M: MembershipRepository,
    R: RoleRepository,
    U: UserRepository,
    S: TenantScopes,
{
    engine: PermissionEngine<M, R>,
    users: U,
    data: S,
}

impl<M, R, U, S> MembershipService<M, R, U, S>
where
    M: MembershipRepository,
    R: RoleRepository,
    U: UserRepository,
    S: TenantScopes,
{
    pub fn new(engine: PermissionEngine<M, R>, users: U, data: S) -> Self {
        Self {
            engine,
            users,
            data,
        }
    }

    pub async fn add_member(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> VitrineResult<Membership> {
        self.engine
            .require(actor, keys::MEMBER_WRITE, Some(tenant_id))
            .await?;

        let user = self.users.get_by_id(user_id).await?;
        let role = self.engine.roles().get_by_id(tenant_id, role_id).await?;
        self.check_owner_grant(actor, tenant_id, &role).await?;

        let membership = self
            .engine
            .members()
            .create(CreateMembership {
                tenant_id,
                user_id: user.id,
                role_id: role.id,
            })
            .await?;

        self.audit(
            tenant_id,
            actor,
            "member.add",
            json!({
                "membership_id": membership.id.to_string(),
                "user_id": user.id.to_string(),
                "role": role.key,
            }),
        )
        .await;
        Ok(membership)
    }

    /// Moves a membership to another role. Assigning the current role is a
    /// no-op.
    pub async fn assign_role(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        membership_id: Uuid,
        role_id: Uuid,
    ) -> VitrineResult<Membership> {
        self.engine
            .require(actor, keys::MEMBER_WRITE, Some(tenant_id))
            .await?;

        let members = self.engine.members();
        let roles = self.engine.roles();
        let membership = members.get(tenant_id, membership_id).await?;
        if membership.role_id == role_id {
            return Ok(membership);
        }

        let current = roles.get_by_id(tenant_id, membership.role_id).await?;
        let next = roles.get_by_id(tenant_id, role_id).await?;
        self.check_owner_grant(actor, tenant_id, &next).await?;
        let owners = self.owner_count(tenant_id, &current).await?;
        invariants::assert_not_last_owner(&current, Some(&next), owners)?;

        // The repository rechecks the owner count inside its transaction.
        let updated = members
            .change_role_guarded(tenant_id, membership_id, role_id)
            .await?;

        self.audit(
            tenant_id,
            actor,
            "member.role_change",
            json!({
                "membership_id": membership_id.to_string(),
                "user_id": membership.user_id.to_string(),
                "from": current.key,
                "to": next.key,
            }),
        )
        .await;
        Ok(updated)
    }

    pub async fn remove_member(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        membership_id: Uuid,
    ) -> VitrineResult<()> {
        self.engine
            .require(actor, keys::MEMBER_WRITE, Some(tenant_id))
            .await?;

        let members = self.engine.members();
        let membership = members.get(tenant_id, membership_id).await?;
        let current = self
            .engine
            .roles()
            .get_by_id(tenant_id, membership.role_id)
            .await?;
        let owners = self.owner_count(tenant_id, &current).await?;
        invariants::assert_not_last_owner(&current, None, owners)?;

        members.remove_guarded(tenant_id, membership_id).await?;

        self.audit(
            tenant_id,
            actor,
            "member.remove",
            json!({
                "membership_id": membership_id.to_string(),
                "user_id": membership.user_id.to_string(),
                "role": current.key,
            }),
        )
        .await;
        Ok(())
    }

    pub async fn list_members(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
    ) -> VitrineResult<Vec<MemberView>> {
        self.engine
            .require_any(
                actor,
                &[keys::MEMBER_READ, keys::MEMBER_WRITE],
                Some(tenant_id),
            )
            .await?;

        let roles: HashMap<Uuid, Role> = self
            .engine
            .roles()
            .list(tenant_id)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let members = self.engine.members().list(tenant_id).await?;
        Ok(members
            .into_iter()
            .map(|membership| {
                let (role_key, role_name) = roles
                    .get(&membership.role_id)
                    .map(|r| (r.key.clone(), r.name.clone()))
                    .unwrap_or_default();
                MemberView {
                    membership,
                    role_key,
                    role_name,
                }
            })
            .collect())
    }

    async fn check_owner_grant(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        target: &Role,
    ) -> VitrineResult<()> {
        if !target.is_owner() || actor.is_superuser() {
            return Ok(());
        }
        let actor_role = match self
            .engine
            .members()
            .get_for_user(tenant_id, actor.user_id)
            .await?
        {
            Some(m) => Some(self.engine.roles().get_by_id(tenant_id, m.role_id).await?),
            None => None,
        };
        invariants::assert_can_grant_owner(actor, actor_role.as_ref(), target)?;
        Ok(())
    }

    async fn owner_count(&self, tenant_id: Uuid, current: &Role) -> VitrineResult<u64> {
        if !current.is_owner() {
            return Ok(0);
        }
        self.engine
            .members()
            .count_with_role(tenant_id, current.id)
            .await
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
