//! Local model ⇄ remote row translation
//!
//! Local records are camelCase; remote rows are snake_case. Nested values
//! (`items`, `position`, `ingredients`) travel as JSON strings. A malformed
//! nested value decodes to its empty default and an unknown status to the
//! collection's initial status; both are logged. Rows that cannot be
//! decoded at all are skipped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{
    DiningTable, Member, MenuItem, Order, OrderItem, OrderStatus, TablePosition, TableStatus,
};

use crate::message::Collection;
use crate::orders::money;

/// A local record with a remote row representation
pub trait RemoteRecord: Sized {
    const COLLECTION: Collection;
    type Row: Serialize + DeserializeOwned;

    fn key(&self) -> String;
    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row) -> Self;
}

/// Encode a record as a remote row
pub fn encode<T: RemoteRecord>(record: &T) -> serde_json::Result<Value> {
    serde_json::to_value(record.to_row())
}

/// Decode remote rows, skipping any that do not fit the row type
pub fn decode_rows<T: RemoteRecord>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T::Row>(row) {
            Ok(row) => Some(T::from_row(row)),
            Err(e) => {
                tracing::warn!(
                    collection = %T::COLLECTION,
                    error = %e,
                    "Skipping undecodable remote row"
                );
                None
            }
        })
        .collect()
}

fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn from_json_string<T: DeserializeOwned + Default>(
    raw: &str,
    collection: Collection,
    field: &str,
    id: &str,
) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(
            collection = %collection,
            id,
            field,
            error = %e,
            "Malformed nested remote value, using default"
        );
        T::default()
    })
}

// ========== orders ==========

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRow {
    pub id: String,
    pub table_number: u32,
    pub items: String,
    pub total: f64,
    pub status: String,
    pub customers: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl RemoteRecord for Order {
    const COLLECTION: Collection = Collection::Orders;
    type Row = OrderRow;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn to_row(&self) -> OrderRow {
        OrderRow {
            id: self.id.clone(),
            table_number: self.table_number,
            items: to_json_string(&self.items),
            total: self.total,
            status: self.status.as_str().to_string(),
            customers: self.customers,
            notes: Some(self.notes.clone()).filter(|n| !n.is_empty()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }

    fn from_row(row: OrderRow) -> Self {
        let items: Vec<OrderItem> =
            from_json_string(&row.items, Collection::Orders, "items", &row.id);
        let status = OrderStatus::parse(&row.status).unwrap_or_else(|| {
            tracing::warn!(id = %row.id, status = %row.status, "Unknown remote order status, using pending");
            OrderStatus::Pending
        });
        Order {
            subtotal: money::subtotal(&items),
            id: row.id,
            table_number: row.table_number,
            customers: row.customers,
            items,
            total: row.total,
            status,
            notes: row.notes.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

// ========== tables ==========

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub id: i64,
    pub number: u32,
    pub name: String,
    pub status: String,
    pub customers: u32,
    pub max_capacity: u32,
    pub position: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteRecord for DiningTable {
    const COLLECTION: Collection = Collection::Tables;
    type Row = TableRow;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn to_row(&self) -> TableRow {
        TableRow {
            id: self.id,
            number: self.number,
            name: self.name.clone(),
            status: self.status.as_str().to_string(),
            customers: self.customers,
            max_capacity: self.max_capacity,
            position: to_json_string(&self.position),
            order_id: self.order_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_row(row: TableRow) -> Self {
        let id = row.id.to_string();
        let position: TablePosition =
            from_json_string(&row.position, Collection::Tables, "position", &id);
        let mut order_id = row.order_id;
        let mut customers = row.customers;
        // Status and order reference must agree; the reference wins when they don't
        let status = match TableStatus::parse(&row.status) {
            None => {
                let fallback = if order_id.is_some() {
                    TableStatus::Occupied
                } else {
                    TableStatus::Available
                };
                tracing::warn!(id = %id, status = %row.status, fallback = %fallback.as_str(), "Unknown remote table status");
                fallback
            }
            Some(TableStatus::Occupied) if order_id.is_none() => {
                tracing::warn!(id = %id, "Remote table occupied without an order, using available");
                customers = 0;
                TableStatus::Available
            }
            Some(status) if status != TableStatus::Occupied && order_id.is_some() => {
                tracing::warn!(id = %id, status = %status.as_str(), "Remote free table references an order, dropping it");
                order_id = None;
                status
            }
            Some(status) => status,
        };
        DiningTable {
            id: row.id,
            number: row.number,
            name: row.name,
            status,
            customers,
            max_capacity: row.max_capacity,
            position,
            order_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ========== menu_items ==========

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItemRow {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub base_spirit: Option<String>,
    pub price: f64,
    pub available: bool,
    pub ingredients: String,
}

impl RemoteRecord for MenuItem {
    const COLLECTION: Collection = Collection::MenuItems;
    type Row = MenuItemRow;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn to_row(&self) -> MenuItemRow {
        MenuItemRow {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            base_spirit: self.base_spirit.clone(),
            price: self.price,
            available: self.available,
            ingredients: to_json_string(&self.ingredients),
        }
    }

    fn from_row(row: MenuItemRow) -> Self {
        let ingredients =
            from_json_string(&row.ingredients, Collection::MenuItems, "ingredients", &row.id);
        MenuItem {
            id: row.id,
            name: row.name,
            category: row.category,
            base_spirit: row.base_spirit,
            price: row.price,
            available: row.available,
            ingredients,
        }
    }
}

// ========== members ==========

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteRecord for Member {
    const COLLECTION: Collection = Collection::Members;
    type Row = MemberRow;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn to_row(&self) -> MemberRow {
        MemberRow {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            points: self.points,
            notes: Some(self.notes.clone()).filter(|n| !n.is_empty()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_row(row: MemberRow) -> Self {
        Member {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            points: row.points,
            notes: row.notes.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
