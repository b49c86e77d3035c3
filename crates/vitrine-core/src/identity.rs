//! Caller identity as handed over by the request layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global (tenant-independent) role of a user account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SystemRole {
    #[default]
    User,
    /// Bypasses every tenant permission check.
    Superuser,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::User => "USER",
            SystemRole::Superuser => "SUPERUSER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(SystemRole::User),
            "SUPERUSER" => Some(SystemRole::Superuser),
            _ => None,
        }
    }
}

/// An authenticated caller: the resolved `(user_id, system_role)` pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: Uuid,
    pub system_role: SystemRole,
}

impl Identity {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            system_role: SystemRole::User,
        }
    }

    pub fn superuser(user_id: Uuid) -> Self {
        Self {
            user_id,
            system_role: SystemRole::Superuser,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.system_role == SystemRole::Superuser
    }
}
