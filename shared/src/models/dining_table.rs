//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Table status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
    Cleaning,
}

impl TableStatus {
    pub const ALL: [TableStatus; 4] = [
        TableStatus::Available,
        TableStatus::Occupied,
        TableStatus::Reserved,
        TableStatus::Cleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::Reserved => "reserved",
            TableStatus::Cleaning => "cleaning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Floor-plan coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TablePosition {
    pub x: f64,
    pub y: f64,
}

/// Dining table entity (桌台)
///
/// `order_id` is a weak back-reference to the occupying order. It is set
/// exactly when `status == Occupied`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: i64,
    /// Display key, unique
    pub number: u32,
    pub name: String,
    pub status: TableStatus,
    pub customers: u32,
    pub max_capacity: u32,
    pub position: TablePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DiningTable {
    pub fn is_occupied(&self) -> bool {
        self.status == TableStatus::Occupied
    }

    /// `orderId` present iff occupied
    pub fn linkage_is_consistent(&self) -> bool {
        self.is_occupied() == self.order_id.is_some()
    }
}

/// Create dining table payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningTableCreate {
    pub id: Option<i64>,
    pub number: Option<u32>,
    pub name: Option<String>,
    pub max_capacity: Option<u32>,
    pub position: Option<TablePosition>,
}

/// Update dining table payload
///
/// Carries no `orderId`: table linkage is owned by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningTableUpdate {
    pub name: Option<String>,
    pub status: Option<TableStatus>,
    pub customers: Option<u32>,
    pub max_capacity: Option<u32>,
    pub position: Option<TablePosition>,
}
