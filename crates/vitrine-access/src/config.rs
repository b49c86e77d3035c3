//! Access-control configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Lets a superuser without memberships land on the earliest-created
    /// tenant when no valid tenant hint is present. Disable in deployments
    /// where superusers must always choose a tenant explicitly.
    pub super_fallback_enabled: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            super_fallback_enabled: true,
        }
    }
}
