//! Backup export / import
//!
//! A backup is the whole local state in one JSON document:
//!
//! ```json
//! { "state": { "orders": [], "tables": [], "menuItems": [], "members": [], "settings": {} } }
//! ```
//!
//! Import is all-or-nothing: every collection present is decoded before any
//! store is touched. Collections absent from the document keep their
//! current contents.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use shared::models::{DiningTable, Member, MenuItem, Order, Settings};

use crate::core::AppState;
use crate::storage::keys;
use crate::utils::{AppError, AppResult};

/// Counts of what an import replaced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub orders: Option<usize>,
    pub tables: Option<usize>,
    pub menu_items: Option<usize>,
    pub members: Option<usize>,
    pub settings: bool,
}

/// Snapshot every collection plus settings
pub fn export(state: &AppState) -> AppResult<Value> {
    let encode = |value: serde_json::Result<Value>| {
        value.map_err(|e| AppError::internal(format!("Cannot encode backup: {e}")))
    };
    let mut root = Map::new();
    root.insert(keys::ORDERS.into(), encode(serde_json::to_value(state.orders.all()))?);
    root.insert(keys::TABLES.into(), encode(serde_json::to_value(state.tables.all()))?);
    root.insert(keys::MENU_ITEMS.into(), encode(serde_json::to_value(state.menu.all()))?);
    root.insert(keys::MEMBERS.into(), encode(serde_json::to_value(state.members.all()))?);
    root.insert(keys::SETTINGS.into(), encode(serde_json::to_value(state.settings.get()))?);
    Ok(json!({ "state": root }))
}

fn decode_array<T: DeserializeOwned>(root: &Map<String, Value>, key: &str) -> AppResult<Option<Vec<T>>> {
    let Some(value) = root.get(key) else {
        return Ok(None);
    };
    if !value.is_array() {
        return Err(AppError::validation(format!("Backup field '{key}' must be an array")));
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|e| AppError::validation(format!("Backup field '{key}' is malformed: {e}")))
}

struct Backup {
    orders: Option<Vec<Order>>,
    tables: Option<Vec<DiningTable>>,
    menu_items: Option<Vec<MenuItem>>,
    members: Option<Vec<Member>>,
    settings: Option<Settings>,
}

impl Backup {
    fn decode(root: &Map<String, Value>) -> AppResult<Self> {
        let settings = match root.get(keys::SETTINGS) {
            None => None,
            Some(value @ Value::Object(_)) => Some(
                serde_json::from_value(value.clone())
                    .map_err(|e| AppError::validation(format!("Backup settings are malformed: {e}")))?,
            ),
            Some(_) => return Err(AppError::validation("Backup field 'settings' must be an object")),
        };
        Ok(Self {
            orders: decode_array(root, keys::ORDERS)?,
            tables: decode_array(root, keys::TABLES)?,
            menu_items: decode_array(root, keys::MENU_ITEMS)?,
            members: decode_array(root, keys::MEMBERS)?,
            settings,
        })
    }
}

/// Replace local state from a backup document
///
/// Accepts either the wrapped `{state: {...}}` form produced by [`export`]
/// or the bare inner object.
pub fn import(state: &AppState, document: Value) -> AppResult<ImportSummary> {
    let Value::Object(mut outer) = document else {
        tracing::warn!("Rejected backup import: document is not an object");
        return Err(AppError::validation("Backup must be a JSON object"));
    };
    let root = match outer.remove("state") {
        Some(Value::Object(inner)) => inner,
        Some(_) => {
            tracing::warn!("Rejected backup import: 'state' is not an object");
            return Err(AppError::validation("Backup field 'state' must be an object"));
        }
        None => outer,
    };

    let backup = Backup::decode(&root).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected backup import");
    })?;

    let mut summary = ImportSummary::default();
    if let Some(list) = backup.orders {
        summary.orders = Some(list.len());
        state.orders.set_orders(list);
    }
    if let Some(list) = backup.tables {
        summary.tables = Some(list.len());
        state.tables.set_tables(list);
    }
    if let Some(list) = backup.menu_items {
        summary.menu_items = Some(list.len());
        state.menu.set_menu_items(list);
    }
    if let Some(list) = backup.members {
        summary.members = Some(list.len());
        state.members.set_members(list);
    }
    if let Some(value) = backup.settings {
        summary.settings = true;
        state.settings.replace(value);
    }

    tracing::info!(?summary, "Backup imported");
    Ok(summary)
}

/// Delete every order and free every table
///
/// Menu, members and settings are kept. Deletions go through the store so
/// the remote mirror sees them.
pub fn clear_all_data(state: &AppState) -> usize {
    let orders = state.orders.all();
    let mut removed = 0;
    for order in &orders {
        if state.orders.delete_order(&order.id).is_ok() {
            removed += 1;
        }
    }
    state.tables.reset_all_tables();
    tracing::info!(orders = removed, "Local order data cleared");
    removed
}
