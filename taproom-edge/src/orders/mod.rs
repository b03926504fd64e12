//! Order store and money helpers
//!
//! ```text
//! UI / Coordinator ──► OrderStore ──► Persist (orders snapshot)
//!                          │
//!                          └──► ChangeBus ──► CloudSyncWorker
//! ```

pub mod money;
pub mod store;

pub use store::OrderStore;
