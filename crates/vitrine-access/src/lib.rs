//! Vitrine Access: tenant resolution, permission checks and the
//! role/membership lifecycle.
//!
//! Services are generic over the repository traits in `vitrine-core` so this
//! crate has no dependency on the database crate.

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod invariants;
pub mod members;
pub mod permission;
pub mod resolver;
pub mod roles;

pub use bootstrap::{BootstrapReport, TenantBootstrap};
pub use config::AccessConfig;
pub use error::AccessError;
pub use members::{MemberView, MembershipService};
pub use permission::{PermissionEngine, PermissionMemo, decide};
pub use resolver::{
    Resolution, ResolutionSource, TenantResolver, TenantSelector, require_tenant, resolve_tenant,
};
pub use roles::{NewRole, RoleDraft, RoleService, RoleUpdate, RoleWithPermissions};
