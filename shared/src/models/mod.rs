//! Data models
//!
//! Shared between the edge node and the UI (via API).
//! Local records serialize camelCase; the remote wire format lives in the
//! edge node's sync schema.

pub mod dining_table;
pub mod member;
pub mod menu_item;
pub mod order;
pub mod settings;

// Re-exports
pub use dining_table::*;
pub use member::*;
pub use menu_item::*;
pub use order::*;
pub use settings::*;
