//! Bar Settings Model

use serde::{Deserialize, Serialize};

/// Local settings record (never pushed to the remote store)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub bar_name: String,
    pub currency: String,
    pub tax_rate_percent: f64,
    /// Push local changes automatically while online
    pub auto_sync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bar_name: "Taproom".to_string(),
            currency: "EUR".to_string(),
            tax_rate_percent: 0.0,
            auto_sync: true,
        }
    }
}

/// Update settings payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub bar_name: Option<String>,
    pub currency: Option<String>,
    pub tax_rate_percent: Option<f64>,
    pub auto_sync: Option<bool>,
}
