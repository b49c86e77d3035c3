//! Audit log domain model.
//!
//! Audit rows are tenant-scoped records written through the scoped
//! data-access handle, so they carry no `tenant_id` of their own here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::query::{Record, into_record};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: Uuid,
    /// Dotted action name (e.g., `role.create`).
    pub action: String,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor_id: Uuid, action: impl Into<String>, metadata: Value) -> Self {
        Self {
            actor_id,
            action: action.into(),
            metadata,
            timestamp: Utc::now(),
        }
    }

    pub fn into_record(self) -> Record {
        into_record(json!({
            "actor_id": self.actor_id.to_string(),
            "action": self.action,
            "metadata": self.metadata,
            "timestamp": self.timestamp.to_rfc3339(),
        }))
    }
}
