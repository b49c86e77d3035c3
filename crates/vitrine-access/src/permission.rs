//! Permission resolution: does an identity hold a capability in a tenant?
//!
//! Keys are opaque strings compared by exact equality. There is no prefix,
//! wildcard or hierarchy matching.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::identity::Identity;
use vitrine_core::repository::{MembershipRepository, RoleRepository};

use crate::error::AccessError;

/// The decision itself, given the identity's granted keys in `tenant_id`.
///
/// Superusers are granted everything, even without a tenant. Anyone else
/// is denied when no tenant is in context.
pub fn decide(
    identity: &Identity,
    tenant_id: Option<Uuid>,
    key: &str,
    granted: &BTreeSet<String>,
) -> bool {
    if identity.is_superuser() {
        return true;
    }
    tenant_id.is_some() && granted.contains(key)
}

/// Point queries against the membership, role and permission tables.
pub struct PermissionEngine<M: MembershipRepository, R: RoleRepository> {
    members: M,
    roles: R,
}

impl<M: MembershipRepository, R: RoleRepository> PermissionEngine<M, R> {
    pub fn new(members: M, roles: R) -> Self {
        Self { members, roles }
    }

    pub fn members(&self) -> &M {
        &self.members
    }

    pub fn roles(&self) -> &R {
        &self.roles
    }

    /// Permission keys of the identity's role in `tenant_id`. Empty when the
    /// identity has no membership there.
    pub async fn granted_keys(
        &self,
        identity: &Identity,
        tenant_id: Uuid,
    ) -> VitrineResult<BTreeSet<String>> {
        let Some(membership) = self
            .members
            .get_for_user(tenant_id, identity.user_id)
            .await?
        else {
            return Ok(BTreeSet::new());
        };
        let keys = self
            .roles
            .permission_keys(tenant_id, membership.role_id)
            .await?;
        Ok(keys.into_iter().collect())
    }

    pub async fn can(
        &self,
        identity: &Identity,
        key: &str,
        tenant_id: Option<Uuid>,
    ) -> VitrineResult<bool> {
        self.can_any(identity, &[key], tenant_id).await
    }

    /// Granted when at least one of `keys` is held. An empty list is denied.
    pub async fn can_any(
        &self,
        identity: &Identity,
        keys: &[&str],
        tenant_id: Option<Uuid>,
    ) -> VitrineResult<bool> {
        let granted = self.load(identity, tenant_id).await?;
        Ok(keys
            .iter()
            .any(|key| decide(identity, tenant_id, key, &granted)))
    }

    /// Like [`can`](Self::can), but a denial becomes `AuthorizationDenied`.
    pub async fn require(
        &self,
        identity: &Identity,
        key: &str,
        tenant_id: Option<Uuid>,
    ) -> VitrineResult<()> {
        if self.can(identity, key, tenant_id).await? {
            Ok(())
        } else {
            debug!(user_id = %identity.user_id, ?tenant_id, permission = key, "permission denied");
            Err(AccessError::MissingPermission {
                permission: key.to_string(),
            }
            .into())
        }
    }

    /// Read-or-write style gate: denied only when none of `keys` is held.
    pub async fn require_any(
        &self,
        identity: &Identity,
        keys: &[&str],
        tenant_id: Option<Uuid>,
    ) -> VitrineResult<()> {
        if self.can_any(identity, keys, tenant_id).await? {
            Ok(())
        } else {
            Err(AccessError::MissingPermission {
                permission: keys.join(" | "),
            }
            .into())
        }
    }

    /// A memo for one request made by `identity`.
    pub fn memo(&self, identity: Identity) -> PermissionMemo<'_, M, R> {
        PermissionMemo {
            engine: self,
            identity,
            granted: Mutex::new(HashMap::new()),
        }
    }

    async fn load(
        &self,
        identity: &Identity,
        tenant_id: Option<Uuid>,
    ) -> VitrineResult<BTreeSet<String>> {
        match tenant_id {
            Some(tenant_id) if !identity.is_superuser() => {
                self.granted_keys(identity, tenant_id).await
            }
            _ => Ok(BTreeSet::new()),
        }
    }
}

/// Request-scoped memoisation of granted keys, bound to a single identity.
///
/// Build one per request and drop it with the request. Role changes made
/// while it is alive are not observed.
pub struct PermissionMemo<'a, M: MembershipRepository, R: RoleRepository> {
    engine: &'a PermissionEngine<M, R>,
    identity: Identity,
    granted: Mutex<HashMap<Uuid, Arc<BTreeSet<String>>>>,
}

impl<M: MembershipRepository, R: RoleRepository> PermissionMemo<'_, M, R> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn can(&self, key: &str, tenant_id: Option<Uuid>) -> VitrineResult<bool> {
        self.can_any(&[key], tenant_id).await
    }

    pub async fn can_any(&self, keys: &[&str], tenant_id: Option<Uuid>) -> VitrineResult<bool> {
        let granted = match tenant_id {
            Some(tenant_id) if !self.identity.is_superuser() => self.granted(tenant_id).await?,
            _ => Arc::default(),
        };
        Ok(keys
            .iter()
            .any(|key| decide(&self.identity, tenant_id, key, &granted)))
    }

    pub async fn require(&self, key: &str, tenant_id: Option<Uuid>) -> VitrineResult<()> {
        if self.can(key, tenant_id).await? {
            Ok(())
        } else {
            Err(AccessError::MissingPermission {
                permission: key.to_string(),
            }
            .into())
        }
    }

    async fn granted(&self, tenant_id: Uuid) -> VitrineResult<Arc<BTreeSet<String>>> {
        let cached = self.cache().get(&tenant_id).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let loaded = Arc::new(self.engine.granted_keys(&self.identity, tenant_id).await?);
        self.cache().insert(tenant_id, Arc::clone(&loaded));
        Ok(loaded)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<BTreeSet<String>>>> {
        self.granted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
