//! Seed-time data shared by every tenant.

use tracing::info;
use vitrine_core::error::VitrineResult;
use vitrine_core::models::permission::PERMISSION_CATALOG;
use vitrine_core::repository::PermissionRepository;

/// Inserts missing catalog permissions and refreshes display names.
/// Safe to run on every start.
pub async fn seed_permission_catalog<P: PermissionRepository>(permissions: &P) -> VitrineResult<u64> {
    let inserted = permissions.ensure_catalog(PERMISSION_CATALOG).await?;
    info!(
        inserted,
        total = PERMISSION_CATALOG.len(),
        "Permission catalog seeded"
    );
    Ok(inserted)
}
