//! Session configuration

use serde::{Deserialize, Serialize};

/// Per-session behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix for request labels, e.g. the journey or page name
    pub breadcrumb: String,

    /// Warn when a lookup matched more than one component
    pub warn_on_ambiguous: bool,

    /// Pin the last-page start index to 1 for grids shorter than one batch
    pub clamp_last_page: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            breadcrumb: "SailUiForm".to_string(),
            warn_on_ambiguous: false,
            clamp_last_page: true,
        }
    }
}

impl SessionConfig {
    pub fn with_breadcrumb(mut self, breadcrumb: impl Into<String>) -> Self {
        self.breadcrumb = breadcrumb.into();
        self
    }

    /// Label reported for a request, e.g. `"Orders.SelectDropdown.Color"`
    pub fn request_label(&self, verb: &str, target: &str) -> String {
        format!("{}.{}.{}", self.breadcrumb, verb, target)
    }
}
