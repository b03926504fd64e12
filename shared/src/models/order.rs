//! Order Model

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle status
///
/// ```text
/// pending ──► preparing ──► completed ──► paid
///    │            │
///    └────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Completed,
    Paid,
    Cancelled,
}

/// Rejected status transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Completed,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Completed => "completed",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a wire value; `None` for anything outside the closed vocabulary
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// `paid` and `cancelled` never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Whether `self → next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::Completed)
                | (OrderStatus::Completed, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Preparing, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&self, next: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: *self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Menu item ID
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Unit price
    pub price: f64,
    pub quantity: i32,
}

/// Order entity (a bill for one table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub table_number: u32,
    pub customers: u32,
    pub items: Vec<OrderItem>,
    /// Σ price × quantity
    pub subtotal: f64,
    /// Subtotal unless overridden by the caller
    pub total: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Order {
    /// Still occupying its table's attention (not paid, not cancelled)
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Create order payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub table_number: Option<u32>,
    #[serde(default)]
    pub customers: Option<u32>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Explicit total (adjustments/tips); computed from items when absent
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Update order payload
///
/// Status and table linkage are not part of this payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub customers: Option<u32>,
    pub items: Option<Vec<OrderItem>>,
    pub total: Option<f64>,
    pub notes: Option<String>,
}

/// Add-on payload for an open order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAmendment {
    /// Items appended to the order
    #[serde(default)]
    pub add_items: Vec<OrderItem>,
    pub customers: Option<u32>,
    pub total: Option<f64>,
    pub notes: Option<String>,
}
