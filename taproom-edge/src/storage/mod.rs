//! Local durable storage
//!
//! ```text
//! Store mutation ──► Persist sink ──► (coalescing window) ──► LocalStorage
//!                                                              ├── RedbBackend  (primary)
//!                                                              └── FileBackend  (fallback, mirrored)
//! ```
//!
//! Every collection is stored under its own key as a JSON snapshot
//! `{ "state": { "<key>": ... } }`.

mod backend;
mod persister;
mod snapshot;

pub use backend::{
    FileBackend, LocalStorage, RedbBackend, SnapshotBackend, StorageError, StorageResult,
};
pub use persister::{CoalescingPersist, ImmediatePersist, Persist, PersistWorker};
pub use snapshot::{decode_snapshot, encode_snapshot};

/// Snapshot keys, one per collection
pub mod keys {
    pub const ORDERS: &str = "orders";
    pub const TABLES: &str = "tables";
    pub const MENU_ITEMS: &str = "menuItems";
    pub const MEMBERS: &str = "members";
    pub const SETTINGS: &str = "settings";
    pub const OFFLINE_QUEUE: &str = "offlineQueue";
}

/// Encode `value` and hand it to the sink; encoding failures are logged
pub fn persist_collection<T: serde::Serialize + ?Sized>(
    sink: &dyn Persist,
    key: &'static str,
    value: &T,
) {
    match encode_snapshot(key, value) {
        Ok(bytes) => sink.persist(key, bytes),
        Err(e) => tracing::error!(key, error = %e, "Failed to encode snapshot"),
    }
}

/// Rehydrate a collection, `T::default()` when nothing was stored yet
pub fn load_collection<T: serde::de::DeserializeOwned + Default>(
    storage: &LocalStorage,
    key: &str,
) -> StorageResult<T> {
    match storage.load(key)? {
        Some(bytes) => decode_snapshot(key, &bytes),
        None => Ok(T::default()),
    }
}
