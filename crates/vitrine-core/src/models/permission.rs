//! Permission domain model.
//!
//! Permissions are global catalog entries; roles reference them by key.
//! Keys are opaque and compared by exact equality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    /// The capability key (e.g., `product.write`).
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Well-known permission keys.
pub mod keys {
    pub const PRODUCT_READ: &str = "product.read";
    pub const PRODUCT_WRITE: &str = "product.write";
    pub const CATEGORY_READ: &str = "category.read";
    pub const CATEGORY_WRITE: &str = "category.write";
    pub const BRAND_READ: &str = "brand.read";
    pub const BRAND_WRITE: &str = "brand.write";
    pub const MEMBER_READ: &str = "member.read";
    pub const MEMBER_WRITE: &str = "member.write";
    pub const ROLE_READ: &str = "role.read";
    pub const ROLE_WRITE: &str = "role.write";
    pub const BRANDING_READ: &str = "branding.read";
    pub const BRANDING_WRITE: &str = "branding.write";
    pub const AUDIT_READ: &str = "audit.read";
    pub const SETTINGS_WRITE: &str = "settings.write";
}

/// Seed-time permission catalog: `(key, display name)`.
pub const PERMISSION_CATALOG: &[(&str, &str)] = &[
    (keys::PRODUCT_READ, "View products"),
    (keys::PRODUCT_WRITE, "Edit products"),
    (keys::CATEGORY_READ, "View categories"),
    (keys::CATEGORY_WRITE, "Edit categories"),
    (keys::BRAND_READ, "View brands"),
    (keys::BRAND_WRITE, "Edit brands"),
    (keys::MEMBER_READ, "View members"),
    (keys::MEMBER_WRITE, "Manage members"),
    (keys::ROLE_READ, "View roles"),
    (keys::ROLE_WRITE, "Manage roles"),
    (keys::BRANDING_READ, "View branding"),
    (keys::BRANDING_WRITE, "Edit branding"),
    (keys::AUDIT_READ, "View audit log"),
    (keys::SETTINGS_WRITE, "Manage tenant settings"),
];
