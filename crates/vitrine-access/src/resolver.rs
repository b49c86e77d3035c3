//! Tenant resolution for an authenticated identity.
//!
//! The hint (cookie, header, session value) is supplied by the request layer
//! through [`TenantSelector`] and is validated against memberships on every
//! call.

use tracing::{debug, warn};
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::identity::Identity;
use vitrine_core::models::membership::Membership;
use vitrine_core::repository::{MembershipRepository, TenantRepository};

use crate::config::AccessConfig;
use crate::error::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The caller's hint, validated against memberships or the super-role.
    Hint,
    /// The identity's earliest membership.
    FirstMembership,
    /// Earliest-created tenant, for superusers without memberships.
    SuperuserFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub tenant_id: Uuid,
    pub source: ResolutionSource,
}

/// Pick the tenant an operation applies to; first rule that matches wins.
///
/// `superuser_fallback` is only consulted for superusers with no
/// memberships. `None` means no tenant context: tenant-scoped permission
/// checks must then be denied.
pub fn resolve_tenant(
    identity: &Identity,
    hint: Option<Uuid>,
    memberships: &[Membership],
    superuser_fallback: Option<Uuid>,
) -> Option<Resolution> {
    if let Some(hint) = hint {
        let member = memberships.iter().any(|m| m.tenant_id == hint);
        if member || identity.is_superuser() {
            return Some(Resolution {
                tenant_id: hint,
                source: ResolutionSource::Hint,
            });
        }
    }

    if let Some(first) = memberships.iter().min_by_key(|m| m.created_at) {
        return Some(Resolution {
            tenant_id: first.tenant_id,
            source: ResolutionSource::FirstMembership,
        });
    }

    if identity.is_superuser() {
        return superuser_fallback.map(|tenant_id| Resolution {
            tenant_id,
            source: ResolutionSource::SuperuserFallback,
        });
    }

    None
}

/// Fail-closed accessor for call sites that need a tenant.
pub fn require_tenant(tenant_id: Option<Uuid>) -> VitrineResult<Uuid> {
    tenant_id.ok_or_else(|| AccessError::NoTenant.into())
}

/// Source and sink of the caller's sticky tenant preference.
pub trait TenantSelector: Send + Sync {
    /// Raw hint as sent by the client. Unparseable values are ignored.
    fn hint(&self) -> Option<String>;

    /// Store the resolved tenant as the new preference.
    fn persist(&self, tenant_id: Uuid) -> impl Future<Output = VitrineResult<()>> + Send;
}

pub struct TenantResolver<M: MembershipRepository, T: TenantRepository> {
    members: M,
    tenants: T,
    config: AccessConfig,
}

impl<M: MembershipRepository, T: TenantRepository> TenantResolver<M, T> {
    pub fn new(members: M, tenants: T, config: AccessConfig) -> Self {
        Self {
            members,
            tenants,
            config,
        }
    }

    /// Resolve the tenant for `identity` and write it back through
    /// `selector` when it differs from the hint.
    ///
    /// A failed write-back is logged and does not fail the resolution.
    pub async fn resolve<S: TenantSelector>(
        &self,
        identity: &Identity,
        selector: &S,
    ) -> VitrineResult<Option<Resolution>> {
        let raw = selector.hint();
        let mut hint = raw.as_deref().and_then(|s| Uuid::parse_str(s.trim()).ok());
        if raw.is_some() && hint.is_none() {
            debug!(user_id = %identity.user_id, "ignoring malformed tenant hint");
        }

        let memberships = self.members.list_for_user(identity.user_id).await?;

        // Superusers may pick any tenant, but only one that exists.
        if let Some(h) = hint {
            if identity.is_superuser() && !memberships.iter().any(|m| m.tenant_id == h) {
                match self.tenants.get_by_id(h).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => hint = None,
                    Err(e) => return Err(e),
                }
            }
        }

        let fallback = if identity.is_superuser()
            && memberships.is_empty()
            && hint.is_none()
            && self.config.super_fallback_enabled
        {
            self.tenants.earliest().await?.map(|t| t.id)
        } else {
            None
        };

        let resolution = resolve_tenant(identity, hint, &memberships, fallback);
        debug!(
            user_id = %identity.user_id,
            tenant_id = ?resolution.map(|r| r.tenant_id),
            source = ?resolution.map(|r| r.source),
            "tenant resolved"
        );

        if let Some(resolved) = resolution.filter(|r| hint != Some(r.tenant_id)) {
            if let Err(e) = selector.persist(resolved.tenant_id).await {
                warn!(
                    user_id = %identity.user_id,
                    tenant_id = %resolved.tenant_id,
                    error = %e,
                    "failed to persist tenant selection"
                );
            }
        }

        Ok(resolution)
    }

    /// [`resolve`](Self::resolve), reduced to the tenant id.
    pub async fn resolve_tenant_id<S: TenantSelector>(
        &self,
        identity: &Identity,
        selector: &S,
    ) -> VitrineResult<Option<Uuid>> {
        Ok(self
            .resolve(identity, selector)
            .await?
            .map(|r| r.tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn membership(tenant_id: Uuid, age_minutes: i64) -> Membership {
        let at = Utc::now() - Duration::minutes(age_minutes);
        Membership {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn valid_hint_wins() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let user = Identity::user(Uuid::new_v4());
        let memberships = [membership(a, 10), membership(b, 5)];

        let r = resolve_tenant(&user, Some(b), &memberships, None).unwrap();
        assert_eq!(r.tenant_id, b);
        assert_eq!(r.source, ResolutionSource::Hint);
    }

    #[test]
    fn foreign_hint_falls_back_to_earliest_membership() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let user = Identity::user(Uuid::new_v4());
        let memberships = [membership(b, 5), membership(a, 10)];

        let r = resolve_tenant(&user, Some(Uuid::new_v4()), &memberships, None).unwrap();
        assert_eq!(r.tenant_id, a);
        assert_eq!(r.source, ResolutionSource::FirstMembership);
    }

    #[test]
    fn superuser_hint_needs_no_membership() {
        let tenant = Uuid::new_v4();
        let root = Identity::superuser(Uuid::new_v4());
        let r = resolve_tenant(&root, Some(tenant), &[], None).unwrap();
        assert_eq!(r.source, ResolutionSource::Hint);
    }

    #[test]
    fn fallback_is_for_superusers_only() {
        let fallback = Some(Uuid::new_v4());
        let root = Identity::superuser(Uuid::new_v4());
        let user = Identity::user(Uuid::new_v4());

        let r = resolve_tenant(&root, None, &[], fallback).unwrap();
        assert_eq!(r.source, ResolutionSource::SuperuserFallback);
        assert_eq!(resolve_tenant(&user, None, &[], fallback), None);
        assert_eq!(resolve_tenant(&root, None, &[], None), None);
    }

    #[test]
    fn missing_tenant_is_a_context_error() {
        assert!(matches!(
            require_tenant(None),
            Err(vitrine_core::VitrineError::TenantContext)
        ));
        let id = Uuid::new_v4();
        assert_eq!(require_tenant(Some(id)).unwrap(), id);
    }
}
