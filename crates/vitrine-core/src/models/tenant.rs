//! Tenant domain model.
//!
//! Tenants are the isolation boundary of the back-office. Catalog data,
//! roles, memberships and branding all belong to exactly one tenant, while
//! the underlying tables are shared by every tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant (shop) with its own catalog, staff and branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// URL-safe unique identifier (e.g., `acme-store`).
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Subscription plan reference, if the tenant is on a paid plan.
    pub plan_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub slug: String,
    pub name: String,
    pub plan_id: Option<String>,
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub plan_id: Option<Option<String>>,
}
