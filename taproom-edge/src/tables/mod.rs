//! Dining table store
//!
//! Occupation (`status = occupied` + `orderId`) is only reachable through
//! crate-private methods; the public update path refuses to touch it.

mod store;

pub use store::TableStore;
