//! Best-effort audit trail for lifecycle mutations.

use tracing::warn;
use uuid::Uuid;
use vitrine_core::models::audit::AuditEvent;
use vitrine_core::query::{DataClient, Entity};

/// Actor recorded for operator-initiated changes with no user behind them.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

/// Write `event` through the tenant's scoped handle. Failures are logged and
/// swallowed; the caller's mutation has already succeeded.
pub async fn record<D: DataClient>(scope: &D, event: AuditEvent) {
    let action = event.action.clone();
    let actor_id = event.actor_id;
    if let Err(e) = scope.create(Entity::AuditLog, event.into_record()).await {
        warn!(%action, %actor_id, error = %e, "failed to write audit log entry");
    }
}
