//! Vitrine Database: SurrealDB storage for the back-office core.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema migrations ([`run_migrations`]) and catalog seeding
//! - The entity store ([`SurrealDataClient`]) and tenant isolation over it
//!   ([`DataLayer`], [`ScopedClient`], [`UnscopedGuard`])
//! - Repository implementations of the `vitrine-core` traits

mod client;
mod connection;
mod error;
mod isolation;
mod repository;
mod schema;
mod seed;
mod sql;

pub use client::{SurrealDataClient, timestamp};
pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use isolation::{
    DataLayer, GuardEvent, GuardMode, GuardObserver, IsolationConfig, LookupPolicy, ScopedClient,
    UnscopedGuard,
};
pub use repository::{
    SurrealMembershipRepository, SurrealPermissionRepository, SurrealRoleRepository,
    SurrealTenantRepository, SurrealUserRepository, verify_password,
};
pub use schema::{latest_version, run_migrations};
pub use seed::seed_permission_catalog;
