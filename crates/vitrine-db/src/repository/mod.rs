//! SurrealDB repository implementations.

mod membership;
mod permission;
mod role;
mod tenant;
mod user;

use surrealdb_types::SurrealValue;

pub use membership::SurrealMembershipRepository;
pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, verify_password};

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}
