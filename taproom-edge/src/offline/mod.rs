//! Offline resilience
//!
//! ```text
//! ConnectivityMonitor ──watch──► OfflineWorker ──replay──► OfflineQueue
//!        │                                                    │
//!        └── probe via SyncService          QueueExecutor ◄───┘
//! ```
//!
//! The queue is durable and ordered. An entry failing `max_retries`
//! times is dropped and reported, never retried again.

mod connectivity;
mod queue;
mod worker;

pub use connectivity::{ConnectivityMonitor, ConnectivityStatus, LinkQuality};
pub use queue::{OfflineQueue, QueueEntry, QueueExecutor, ReplayReport};
pub use worker::OfflineWorker;
