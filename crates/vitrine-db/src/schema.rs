//! Schema definitions and migration runner for SurrealDB.
//!
//! Identity and access tables are SCHEMAFULL; UUIDs are stored as strings
//! and enums as strings with ASSERT constraints. Tenant-scoped entity tables
//! are SCHEMALESS JSON records guarded by unique indexes, since their shape
//! is owned by the catalog handlers rather than this crate.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "access_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "tenant_entities",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: tenants, users, roles, permissions, memberships
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD plan_id ON TABLE tenant TYPE option<string>;
-- Bumped inside every owner-affecting transaction so that concurrent
-- owner changes for one tenant conflict instead of interleaving.
DEFINE FIELD owner_guard ON TABLE tenant TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (global scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD name ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD system_role ON TABLE user TYPE string \
    ASSERT $value IN ['USER', 'SUPERUSER'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Permission catalog (global scope)
-- =======================================================================
DEFINE TABLE permission SCHEMAFULL;
DEFINE FIELD key ON TABLE permission TYPE string;
DEFINE FIELD name ON TABLE permission TYPE string;
DEFINE FIELD created_at ON TABLE permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_permission_key ON TABLE permission COLUMNS key UNIQUE;

-- =======================================================================
-- Roles (tenant scope)
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE role TYPE string;
DEFINE FIELD key ON TABLE role TYPE string;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD description ON TABLE role TYPE string DEFAULT '';
DEFINE FIELD builtin ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_tenant_key ON TABLE role \
    COLUMNS tenant_id, key UNIQUE;

-- Role -> Permission assignments
DEFINE TABLE role_permission SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE role_permission TYPE string;
DEFINE FIELD role_id ON TABLE role_permission TYPE string;
DEFINE FIELD permission_key ON TABLE role_permission TYPE string;
DEFINE INDEX idx_role_permission_unique ON TABLE role_permission \
    COLUMNS role_id, permission_key UNIQUE;
DEFINE INDEX idx_role_permission_tenant ON TABLE role_permission \
    COLUMNS tenant_id, role_id;

-- =======================================================================
-- Memberships (tenant scope)
-- =======================================================================
DEFINE TABLE membership SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE membership TYPE string;
DEFINE FIELD user_id ON TABLE membership TYPE string;
DEFINE FIELD role_id ON TABLE membership TYPE string;
DEFINE FIELD created_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_membership_tenant_user ON TABLE membership \
    COLUMNS tenant_id, user_id UNIQUE;
DEFINE INDEX idx_membership_tenant_role ON TABLE membership \
    COLUMNS tenant_id, role_id;
DEFINE INDEX idx_membership_user ON TABLE membership COLUMNS user_id;
";

// -----------------------------------------------------------------------
// Schema v2: tenant-scoped entity tables
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE category SCHEMALESS;
DEFINE INDEX idx_category_uid ON TABLE category COLUMNS uid UNIQUE;
DEFINE INDEX idx_category_tenant_slug ON TABLE category \
    COLUMNS tenant_id, slug UNIQUE;

DEFINE TABLE brand SCHEMALESS;
DEFINE INDEX idx_brand_uid ON TABLE brand COLUMNS uid UNIQUE;
DEFINE INDEX idx_brand_tenant_slug ON TABLE brand \
    COLUMNS tenant_id, slug UNIQUE;

DEFINE TABLE product SCHEMALESS;
DEFINE INDEX idx_product_uid ON TABLE product COLUMNS uid UNIQUE;
DEFINE INDEX idx_product_tenant_slug ON TABLE product \
    COLUMNS tenant_id, slug UNIQUE;

DEFINE TABLE product_image SCHEMALESS;
DEFINE INDEX idx_product_image_uid ON TABLE product_image \
    COLUMNS uid UNIQUE;
DEFINE INDEX idx_product_image_tenant ON TABLE product_image \
    COLUMNS tenant_id, product_id;

DEFINE TABLE tenant_branding SCHEMALESS;
DEFINE INDEX idx_tenant_branding_uid ON TABLE tenant_branding \
    COLUMNS uid UNIQUE;
DEFINE INDEX idx_tenant_branding_tenant ON TABLE tenant_branding \
    COLUMNS tenant_id UNIQUE;

DEFINE TABLE audit_log SCHEMALESS;
DEFINE INDEX idx_audit_log_uid ON TABLE audit_log COLUMNS uid UNIQUE;
DEFINE INDEX idx_audit_log_tenant ON TABLE audit_log \
    COLUMNS tenant_id, created_at;

DEFINE TABLE feature_override SCHEMALESS;
DEFINE INDEX idx_feature_override_uid ON TABLE feature_override \
    COLUMNS uid UNIQUE;
DEFINE INDEX idx_feature_override_tenant_feature ON TABLE feature_override \
    COLUMNS tenant_id, feature UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// The latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
