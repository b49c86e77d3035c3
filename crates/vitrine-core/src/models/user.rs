//! User domain model.
//!
//! Users are global identities; they reach tenants through memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{Identity, SystemRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Globally unique.
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub system_role: SystemRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            system_role: self.system_role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: Option<String>,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: String,
    pub system_role: SystemRole,
}
