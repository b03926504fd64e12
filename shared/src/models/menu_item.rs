//! Menu Item Model

use serde::{Deserialize, Serialize};

/// Menu catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_spirit: Option<String>,
    pub price: f64,
    pub available: bool,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Create menu item payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemCreate {
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub base_spirit: Option<String>,
    pub price: f64,
    pub available: Option<bool>,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Update menu item payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub base_spirit: Option<String>,
    pub price: Option<f64>,
    pub available: Option<bool>,
    pub ingredients: Option<Vec<String>>,
}
