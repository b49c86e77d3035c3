//! Access-control error types.

use thiserror::Error;
use vitrine_core::error::{ConflictReason, VitrineError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("missing permission `{permission}`")]
    MissingPermission { permission: String },

    #[error("only an owner or superuser may grant the OWNER role")]
    OwnerGrantDenied,

    #[error("permissions of built-in role `{key}` cannot be changed")]
    BuiltinRoleImmutable { key: String },

    #[error("built-in role `{key}` cannot be deleted")]
    BuiltinRoleUndeletable { key: String },

    #[error("no tenant context")]
    NoTenant,

    #[error("invalid role key `{key}`: {reason}")]
    InvalidRoleKey { key: String, reason: &'static str },

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("a role needs at least one permission")]
    EmptyPermissionSet,

    #[error("unknown permission keys: {}", .keys.join(", "))]
    UnknownPermissionKeys { keys: Vec<String> },

    #[error("role key `{key}` is already used in this tenant")]
    DuplicateRoleKey { key: String },

    #[error(transparent)]
    Conflict(ConflictReason),
}

impl From<AccessError> for VitrineError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::MissingPermission { .. }
            | AccessError::OwnerGrantDenied
            | AccessError::BuiltinRoleImmutable { .. }
            | AccessError::BuiltinRoleUndeletable { .. } => VitrineError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AccessError::NoTenant => VitrineError::TenantContext,
            AccessError::InvalidRoleKey { .. } => VitrineError::validation("key", err.to_string()),
            AccessError::Required { field } => VitrineError::validation(field, err.to_string()),
            AccessError::EmptyPermissionSet | AccessError::UnknownPermissionKeys { .. } => {
                VitrineError::validation("permission_keys", err.to_string())
            }
            AccessError::DuplicateRoleKey { key } => {
                VitrineError::Conflict(ConflictReason::Duplicate {
                    entity: "role".into(),
                    field: "key".into(),
                    value: key,
                })
            }
            AccessError::Conflict(reason) => VitrineError::Conflict(reason),
        }
    }
}
