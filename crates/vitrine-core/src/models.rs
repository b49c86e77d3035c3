//! Domain models for Vitrine.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod branding;
pub mod catalog;
pub mod membership;
pub mod permission;
pub mod role;
pub mod tenant;
pub mod user;
