//! Isolation settings shared by the scoped and unscoped handles.

use std::collections::BTreeSet;

use serde::Deserialize;
use vitrine_core::query::Entity;

/// How scoped handles treat single-row lookups by unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupPolicy {
    /// Rewrite into a tenant-filtered `find_first`.
    #[default]
    Inject,
    /// Reject with `ScopeViolation`.
    Strict,
}

/// Behaviour of the unscoped handle when it touches a tenant-scoped entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    Off,
    /// Log and notify the observer, then proceed.
    #[default]
    Warn,
    /// Fail with `ScopeViolation`.
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub lookup_policy: LookupPolicy,
    pub guard_mode: GuardMode,
    /// Entity kinds whose rows carry a `tenant_id` and must be scoped.
    pub scoped_entities: BTreeSet<Entity>,
}

impl IsolationConfig {
    pub fn is_scoped(&self, entity: Entity) -> bool {
        self.scoped_entities.contains(&entity)
    }

    pub fn with_lookup_policy(mut self, policy: LookupPolicy) -> Self {
        self.lookup_policy = policy;
        self
    }

    pub fn with_guard_mode(mut self, mode: GuardMode) -> Self {
        self.guard_mode = mode;
        self
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            lookup_policy: LookupPolicy::default(),
            guard_mode: GuardMode::default(),
            scoped_entities: Entity::ALL.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_scope_every_entity() {
        let config = IsolationConfig::default();
        assert_eq!(config.lookup_policy, LookupPolicy::Inject);
        assert_eq!(config.guard_mode, GuardMode::Warn);
        assert!(Entity::ALL.iter().all(|e| config.is_scoped(*e)));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: IsolationConfig = serde_json::from_value(serde_json::json!({
            "guard_mode": "strict",
            "scoped_entities": ["product", "brand"]
        }))
        .unwrap();
        assert_eq!(config.guard_mode, GuardMode::Strict);
        assert_eq!(config.lookup_policy, LookupPolicy::Inject);
        assert!(config.is_scoped(Entity::Product));
        assert!(!config.is_scoped(Entity::AuditLog));
    }
}
