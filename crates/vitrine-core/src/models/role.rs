//! Role domain model.
//!
//! Roles are tenant-scoped bundles of permission keys. Four built-in roles
//! are seeded into every tenant; their permission sets cannot be changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::{PERMISSION_CATALOG, keys};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique within the tenant.
    pub key: String,
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Built-in roles whose permission set is frozen.
    pub fn is_protected(&self) -> bool {
        self.builtin && BuiltinRole::from_key(&self.key).is_some()
    }

    pub fn is_owner(&self) -> bool {
        self.key == BuiltinRole::Owner.key()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub tenant_id: Uuid,
    pub key: String,
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub permission_keys: Vec<String>,
}

/// Metadata changes. Permission changes go through
/// `RoleRepository::replace_permissions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Roles seeded into every tenant at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRole {
    Owner,
    Admin,
    Editor,
    Readonly,
}

impl BuiltinRole {
    pub const ALL: [BuiltinRole; 4] = [
        BuiltinRole::Owner,
        BuiltinRole::Admin,
        BuiltinRole::Editor,
        BuiltinRole::Readonly,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            BuiltinRole::Owner => "OWNER",
            BuiltinRole::Admin => "ADMIN",
            BuiltinRole::Editor => "EDITOR",
            BuiltinRole::Readonly => "READONLY",
        }
    }

    /// Exact match on the stored key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == key)
    }

    /// Case-insensitive match, used to reject look-alike custom keys.
    pub fn collides_with(key: &str) -> bool {
        Self::ALL.iter().any(|b| b.key().eq_ignore_ascii_case(key))
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            BuiltinRole::Owner => "Owner",
            BuiltinRole::Admin => "Administrator",
            BuiltinRole::Editor => "Editor",
            BuiltinRole::Readonly => "Read-only",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            BuiltinRole::Owner => "Full control of the tenant, including ownership transfer",
            BuiltinRole::Admin => "Manages catalog, members and roles",
            BuiltinRole::Editor => "Edits the catalog",
            BuiltinRole::Readonly => "Views the catalog and settings",
        }
    }

    pub fn permission_keys(&self) -> Vec<String> {
        let all = PERMISSION_CATALOG.iter().map(|(key, _)| *key);
        let selected: Vec<&str> = match self {
            BuiltinRole::Owner => all.collect(),
            BuiltinRole::Admin => all.filter(|k| *k != keys::SETTINGS_WRITE).collect(),
            BuiltinRole::Editor => vec![
                keys::PRODUCT_READ,
                keys::PRODUCT_WRITE,
                keys::CATEGORY_READ,
                keys::CATEGORY_WRITE,
                keys::BRAND_READ,
                keys::BRAND_WRITE,
                keys::BRANDING_READ,
            ],
            BuiltinRole::Readonly => all
                .filter(|k| k.ends_with(".read") && *k != keys::AUDIT_READ)
                .collect(),
        };
        selected.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_collision_is_case_insensitive() {
        assert!(BuiltinRole::collides_with("owner"));
        assert!(BuiltinRole::collides_with("ReadOnly"));
        assert!(!BuiltinRole::collides_with("editor-lite"));
        assert_eq!(BuiltinRole::from_key("owner"), None);
        assert_eq!(BuiltinRole::from_key("OWNER"), Some(BuiltinRole::Owner));
    }

    #[test]
    fn builtin_permission_sets_are_nested() {
        let owner = BuiltinRole::Owner.permission_keys();
        let admin = BuiltinRole::Admin.permission_keys();
        let readonly = BuiltinRole::Readonly.permission_keys();

        assert_eq!(owner.len(), PERMISSION_CATALOG.len());
        assert!(!admin.iter().any(|k| k == keys::SETTINGS_WRITE));
        assert!(admin.iter().all(|k| owner.contains(k)));
        assert!(readonly.iter().all(|k| k.ends_with(".read")));
        assert!(!readonly.iter().any(|k| k == keys::AUDIT_READ));
    }
}
