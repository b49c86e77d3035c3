//! Named precondition checks for role and membership mutations.
//!
//! Each check is a pure function over already-loaded state so the services
//! can compose them explicitly at every entry point, and so they can be
//! tested without a store.

use vitrine_core::error::ConflictReason;
use vitrine_core::identity::Identity;
use vitrine_core::models::role::{BuiltinRole, Role};

use crate::error::AccessError;

pub const MAX_ROLE_KEY_LEN: usize = 64;

/// Custom role keys: 1-64 ASCII letters, digits, `_` or `-`, starting with a
/// letter or digit, and never a built-in key in any casing.
pub fn validate_role_key(key: &str) -> Result<(), AccessError> {
    let invalid = |reason| AccessError::InvalidRoleKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(AccessError::Required { field: "key" });
    }
    if key.len() > MAX_ROLE_KEY_LEN {
        return Err(invalid("must be at most 64 characters"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("only letters, digits, '_' and '-' are allowed"));
    }
    if !key.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid("must start with a letter or digit"));
    }
    if BuiltinRole::collides_with(key) {
        return Err(invalid("reserved for a built-in role"));
    }
    Ok(())
}

/// `existing` is the role currently holding `key` in the tenant, if any.
pub fn assert_key_unique(key: &str, existing: Option<&Role>) -> Result<(), AccessError> {
    match existing {
        Some(_) => Err(AccessError::DuplicateRoleKey {
            key: key.to_string(),
        }),
        None => Ok(()),
    }
}

/// Rejects an empty set, then names every requested key missing from the
/// catalog in request order.
pub fn assert_permission_keys_known(
    requested: &[String],
    known: &[String],
) -> Result<(), AccessError> {
    if requested.is_empty() {
        return Err(AccessError::EmptyPermissionSet);
    }

    let mut unknown: Vec<String> = Vec::new();
    for key in requested {
        if !known.contains(key) && !unknown.contains(key) {
            unknown.push(key.clone());
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(AccessError::UnknownPermissionKeys { keys: unknown })
    }
}

/// Protected built-in roles keep their permission set; metadata changes are
/// always allowed.
pub fn assert_role_mutable(role: &Role, changes_permissions: bool) -> Result<(), AccessError> {
    if changes_permissions && role.is_protected() {
        return Err(AccessError::BuiltinRoleImmutable {
            key: role.key.clone(),
        });
    }
    Ok(())
}

/// `members` counts memberships referencing `role`; `owner_members` counts
/// memberships holding the tenant's OWNER role.
pub fn assert_role_deletable(
    role: &Role,
    members: u64,
    owner_members: u64,
) -> Result<(), AccessError> {
    if role.builtin || role.is_protected() {
        return Err(AccessError::BuiltinRoleUndeletable {
            key: role.key.clone(),
        });
    }
    if members > 0 {
        return Err(AccessError::Conflict(ConflictReason::RoleInUse {
            key: role.key.clone(),
            members,
        }));
    }
    if role.is_owner() && owner_members > 0 {
        return Err(AccessError::Conflict(ConflictReason::OwnerRoleHeld));
    }
    Ok(())
}

/// `next` is the role the membership moves to, or `None` for removal.
pub fn assert_not_last_owner(
    current: &Role,
    next: Option<&Role>,
    owner_count: u64,
) -> Result<(), AccessError> {
    let stays_owner = next.is_some_and(Role::is_owner);
    if current.is_owner() && !stays_owner && owner_count <= 1 {
        return Err(AccessError::Conflict(ConflictReason::LastOwner));
    }
    Ok(())
}

/// Only a tenant OWNER or a superuser may hand out the OWNER role.
pub fn assert_can_grant_owner(
    actor: &Identity,
    actor_role: Option<&Role>,
    target: &Role,
) -> Result<(), AccessError> {
    if !target.is_owner() || actor.is_superuser() || actor_role.is_some_and(Role::is_owner) {
        return Ok(());
    }
    Err(AccessError::OwnerGrantDenied)
}
