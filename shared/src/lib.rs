//! Shared types for the Taproom bar POS
//!
//! Entity models and their lifecycle rules, used by the edge node and
//! serialized as-is to local storage and to the UI.

pub mod models;
pub mod util;

// Re-exports
pub use models::{
    DiningTable, Member, MenuItem, Order, OrderItem, OrderStatus, Settings, TablePosition,
    TableStatus, TransitionError,
};
pub use serde::{Deserialize, Serialize};
pub use util::{Clock, ManualClock, SystemClock};
