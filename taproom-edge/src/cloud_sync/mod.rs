//! Remote sync - push local collections to a remote table store, pull them back
//!
//! ```text
//! SyncService
//!   ├── test_connection: bounded-retry probe
//!   ├── push: concurrent per-record upserts, all-settled
//!   ├── pull: select every collection, decode rows
//!   └── QueueExecutor: replays offline queue entries
//!
//! CloudSyncWorker
//!   ├── Listen: ChangeBus → debounced push of changed records
//!   └── Offline / failed push → OfflineQueue
//! ```
//!
//! Conflict policy is last-write-wins: every push is a blind upsert.

mod http;
mod memory;
mod remote;
pub mod schema;
mod service;
mod worker;

pub use http::PostgrestRemote;
pub use memory::MemoryRemote;
pub use remote::{RemoteError, RemoteResult, RemoteStore};
pub use service::{
    CollectionPush, ProbeOutcome, PullReport, PushReport, SyncResult, SyncService, SyncSnapshot,
};
pub use worker::CloudSyncWorker;
