//! Vitrine Core: domain models, error taxonomy, caller identity and the
//! data-access contracts shared by the storage and access-control crates.

pub mod error;
pub mod identity;
pub mod models;
pub mod query;
pub mod repository;

pub use error::{ConflictReason, VitrineError, VitrineResult};
pub use identity::{Identity, SystemRole};
