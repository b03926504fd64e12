//! 变更总线核心实现

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Broadcast channel capacity
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Synced entity collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Orders,
    Tables,
    MenuItems,
    Members,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Orders,
        Collection::Tables,
        Collection::MenuItems,
        Collection::Members,
    ];

    /// Local snapshot key
    pub fn storage_key(&self) -> &'static str {
        match self {
            Collection::Orders => crate::storage::keys::ORDERS,
            Collection::Tables => crate::storage::keys::TABLES,
            Collection::MenuItems => crate::storage::keys::MENU_ITEMS,
            Collection::Members => crate::storage::keys::MEMBERS,
        }
    }

    /// Remote table name
    pub fn remote_table(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Tables => "tables",
            Collection::MenuItems => "menu_items",
            Collection::Members => "members",
        }
    }

    /// Inverse of [`Collection::storage_key`]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.storage_key() == key)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Kind of committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Upsert,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Upsert => "upsert",
            ChangeAction::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upsert" => Some(ChangeAction::Upsert),
            "delete" => Some(ChangeAction::Delete),
            _ => None,
        }
    }
}

/// A committed mutation of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub collection: Collection,
    /// Record primary key, stringified
    pub id: String,
    pub action: ChangeAction,
}

/// Broadcast bus for [`StoreChange`]s
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<StoreChange>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }

    /// Publish a change; silently dropped when nobody listens
    pub fn publish(&self, collection: Collection, id: impl Into<String>, action: ChangeAction) {
        let _ = self.tx.send(StoreChange {
            collection,
            id: id.into(),
            action,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_keys_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_key(collection.storage_key()), Some(collection));
        }
        assert_eq!(Collection::MenuItems.storage_key(), "menuItems");
        assert_eq!(Collection::MenuItems.remote_table(), "menu_items");
        assert_eq!(Collection::from_key("settings"), None);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Collection::Orders, "o-1", ChangeAction::Upsert);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.collection, Collection::Orders);
        assert_eq!(change.id, "o-1");
        assert_eq!(change.action, ChangeAction::Upsert);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = ChangeBus::new();
        bus.publish(Collection::Tables, "1", ChangeAction::Delete);
    }
}
