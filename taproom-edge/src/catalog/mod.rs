//! Catalog-style collections: menu, members, settings
//!
//! Plain CRUD stores with the same persistence contract as the order and
//! table stores. Settings stay local and are never pushed.

mod members;
mod menu;
mod settings;

pub use members::MemberStore;
pub use menu::MenuStore;
pub use settings::SettingsStore;
