//! Tenant branding (theme) defaults.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::query::{Record, into_record};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branding {
    pub theme: String,
    pub primary_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub logo_url: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            theme: "light".into(),
            primary_color: "#111827".into(),
            accent_color: "#2563eb".into(),
            font_family: "Inter".into(),
            logo_url: None,
        }
    }
}

impl Branding {
    pub fn into_record(self) -> Record {
        into_record(json!({
            "theme": self.theme,
            "primary_color": self.primary_color,
            "accent_color": self.accent_color,
            "font_family": self.font_family,
            "logo_url": self.logo_url,
        }))
    }
}
