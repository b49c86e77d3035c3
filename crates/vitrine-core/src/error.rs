//! Error types for the Vitrine back-office core.

use thiserror::Error;

/// Why a request was rejected as conflicting with current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },

    #[error("the tenant's last owner cannot be demoted or removed")]
    LastOwner,

    #[error("role '{key}' is still assigned to {members} membership(s)")]
    RoleInUse { key: String, members: u64 },

    #[error("the OWNER role is still held by members of this tenant")]
    OwnerRoleHeld,

    #[error("concurrent modification, retry the request")]
    ConcurrentModification,
}

#[derive(Debug, Error)]
pub enum VitrineError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// Also returned for rows that exist only outside the caller's tenant.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Cross-tenant write on {entity}: scope is {scope}, payload asserted {attempted}")]
    CrossTenantWrite {
        entity: String,
        scope: String,
        attempted: String,
    },

    #[error("Operation `{operation}` on tenant-scoped {entity} is not allowed through this handle")]
    ScopeViolation { entity: String, operation: String },

    #[error("Tenant context missing or invalid")]
    TenantContext,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VitrineError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type VitrineResult<T> = Result<T, VitrineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_the_reason() {
        let err = VitrineError::Conflict(ConflictReason::RoleInUse {
            key: "editor-lite".into(),
            members: 2,
        });
        assert_eq!(
            err.to_string(),
            "Conflict: role 'editor-lite' is still assigned to 2 membership(s)"
        );
        assert!(
            VitrineError::Conflict(ConflictReason::LastOwner)
                .to_string()
                .contains("last owner")
        );
    }

    #[test]
    fn not_found_helper() {
        let err = VitrineError::not_found("product", 42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: product with id 42");
    }
}
