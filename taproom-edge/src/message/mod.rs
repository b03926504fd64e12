//! In-process change bus
//!
//! Stores publish a [`StoreChange`] after every committed mutation; the
//! cloud sync worker subscribes and turns them into remote upserts/deletes.
//!
//! ```text
//! OrderStore ─┐
//! TableStore ─┼──► ChangeBus (broadcast) ──► CloudSyncWorker
//! MenuStore  ─┤
//! MemberStore┘
//! ```

mod bus;

pub use bus::{ChangeAction, ChangeBus, Collection, StoreChange};
