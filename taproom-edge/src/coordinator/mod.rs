//! Cross-entity coordinator
//!
//! The only component that mutates an order and its table for one logical
//! action. Compound operations are best-effort: each step is atomic on its
//! own store, a failing later step is logged as a data-consistency warning
//! and earlier steps are not rolled back. The consistency sweep picks up
//! whatever drift that leaves behind.

mod consistency;

pub use consistency::{ConsistencyReport, Drift};

use shared::models::{
    DiningTable, DiningTableUpdate, Order, OrderAmendment, OrderCreate, OrderStatus, OrderUpdate,
};
use std::sync::Arc;

use crate::orders::{OrderStore, money};
use crate::tables::TableStore;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Coordinator {
    orders: Arc<OrderStore>,
    tables: Arc<TableStore>,
}

impl Coordinator {
    pub fn new(orders: Arc<OrderStore>, tables: Arc<TableStore>) -> Self {
        Self { orders, tables }
    }

    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    /// Live order currently holding `table`, if any
    ///
    /// A reference to a missing or cancelled order is stale and released on
    /// the spot so the table can be reused.
    fn live_holder(&self, table: &DiningTable) -> Option<Order> {
        let holder_id = table.order_id.as_deref()?;
        match self.orders.get(holder_id) {
            Some(order) if order.status != OrderStatus::Cancelled => Some(order),
            stale => {
                tracing::warn!(
                    table_number = table.number,
                    order_id = %holder_id,
                    status = ?stale.map(|o| o.status),
                    "Releasing stale table reference"
                );
                self.tables.release_table(holder_id);
                None
            }
        }
    }

    /// Add an order and occupy its table
    pub fn create_order_and_occupy_table(&self, input: OrderCreate) -> AppResult<Order> {
        if let Some(table) = input.table_number.and_then(|n| self.tables.by_number(n)) {
            if let Some(holder) = self.live_holder(&table) {
                let e = AppError::TableOccupied(format!(
                    "Table {} is held by order {} ({})",
                    table.number, holder.id, holder.status
                ));
                tracing::warn!(table_number = table.number, error = %e, "Rejected new order");
                return Err(e);
            }
        }

        let order = self.orders.add_order(input)?;

        match self
            .tables
            .occupy(order.table_number, &order.id, order.customers)
        {
            Ok(table) => {
                tracing::info!(
                    order_id = %order.id,
                    table_id = table.id,
                    table_number = table.number,
                    "Order created, table occupied"
                );
            }
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    order_id = %order.id,
                    table_number = order.table_number,
                    "Order created for a table that does not exist"
                );
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    table_number = order.table_number,
                    error = %e,
                    "Data consistency: order created but table not occupied"
                );
            }
        }
        Ok(order)
    }

    /// Delete an order, then release whatever table references it
    pub fn delete_order_and_release_table(&self, order_id: &str) -> AppResult<Order> {
        let deleted = self.orders.delete_order(order_id);
        let released = self.tables.release_table(order_id);
        tracing::debug!(order_id = %order_id, released, "Order deletion processed");
        deleted
    }

    /// Add-on: append items to an open order and update counts
    ///
    /// Lines with the same menu item and price are merged. Without an
    /// explicit `total`, the total is recomputed from the merged items.
    pub fn amend_existing_order(&self, order_id: &str, amendment: OrderAmendment) -> AppResult<Order> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        if order.status.is_terminal() {
            let e = AppError::business_rule(format!(
                "Order {order_id} is already {}; open a new order for additional items",
                order.status
            ));
            tracing::warn!(order_id = %order_id, error = %e, "Rejected add-on");
            return Err(e);
        }
        if let Err(e) = amendment.add_items.iter().try_for_each(money::validate_item) {
            tracing::warn!(order_id = %order_id, error = %e, "Rejected add-on");
            return Err(e);
        }

        let items = (!amendment.add_items.is_empty())
            .then(|| money::merge_items(&order.items, &amendment.add_items));
        let updated = self.orders.update_order(
            order_id,
            OrderUpdate {
                customers: amendment.customers,
                items,
                total: amendment.total,
                notes: amendment.notes,
            },
        )?;

        if updated.customers != order.customers {
            for table in self.tables.by_order(order_id) {
                let mirrored = self.tables.apply(
                    table.id,
                    DiningTableUpdate {
                        customers: Some(updated.customers),
                        ..Default::default()
                    },
                    None,
                );
                if let Err(e) = mirrored {
                    tracing::warn!(
                        order_id = %order_id,
                        table_id = table.id,
                        error = %e,
                        "Data consistency: customers not mirrored to table"
                    );
                }
            }
        }

        tracing::info!(
            order_id = %order_id,
            added = amendment.add_items.len(),
            total = updated.total,
            "Order amended"
        );
        Ok(updated)
    }

    /// Release the table of a paid order; the order itself is kept
    pub fn settle_and_release(&self, order_id: &str) -> AppResult<Order> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        if order.status != OrderStatus::Paid {
            let e = AppError::business_rule(format!(
                "Order {order_id} is not yet settled (status: {})",
                order.status
            ));
            tracing::warn!(order_id = %order_id, error = %e, "Rejected table release");
            return Err(e);
        }

        let released = self.tables.release_table(order_id);
        tracing::info!(order_id = %order_id, released, "Order settled, table released");
        Ok(order)
    }

    /// Move an order along its lifecycle
    ///
    /// Cancelling also releases the order's table.
    pub fn transition(&self, order_id: &str, next: OrderStatus) -> AppResult<Order> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        if let Err(e) = order.status.transition_to(next) {
            let e = AppError::business_rule(e.to_string());
            tracing::warn!(order_id = %order_id, error = %e, "Rejected status change");
            return Err(e);
        }

        let updated = self.orders.set_status(order_id, next)?;
        if next == OrderStatus::Cancelled {
            self.tables.release_table(order_id);
        }
        tracing::info!(order_id = %order_id, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }

    pub fn start_preparation(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderStatus::Preparing)
    }

    pub fn complete_order(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderStatus::Completed)
    }

    pub fn mark_paid(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderStatus::Paid)
    }

    pub fn cancel_order(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderStatus::Cancelled)
    }

    /// Move a live order to another free table
    pub fn move_order(&self, order_id: &str, table_number: u32) -> AppResult<Order> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;
        if !order.is_live() {
            return Err(AppError::business_rule(format!(
                "Order {order_id} is {} and cannot change tables",
                order.status
            )));
        }
        if order.table_number == table_number {
            return Ok(order);
        }

        let target = self
            .tables
            .by_number(table_number)
            .ok_or_else(|| AppError::not_found(format!("Table number {table_number}")))?;
        if let Some(holder) = self.live_holder(&target) {
            let e = AppError::TableOccupied(format!(
                "Table {table_number} is held by order {}",
                holder.id
            ));
            tracing::warn!(order_id = %order_id, error = %e, "Rejected order move");
            return Err(e);
        }

        let moved = self.orders.set_table_number(order_id, table_number)?;
        self.tables.release_table(order_id);
        if let Err(e) = self.tables.occupy(table_number, order_id, moved.customers) {
            tracing::warn!(
                order_id = %order_id,
                table_number,
                error = %e,
                "Data consistency: order moved but target table not occupied"
            );
        }
        tracing::info!(
            order_id = %order_id,
            from = order.table_number,
            to = table_number,
            "Order moved"
        );
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChangeBus;
    use crate::storage::{ImmediatePersist, LocalStorage};
    use shared::models::{DiningTableCreate, OrderItem, TableStatus};
    use shared::util::ManualClock;

    fn coordinator() -> Coordinator {
        let storage = LocalStorage::in_memory().unwrap();
        let persist = Arc::new(ImmediatePersist::new(storage.clone()));
        let clock = Arc::new(ManualClock::new(1_000));
        let bus = ChangeBus::new();
        Coordinator::new(
            Arc::new(OrderStore::new(persist.clone(), clock.clone(), bus.clone())),
            Arc::new(TableStore::new(persist, clock, bus)),
        )
    }

    fn add_table(c: &Coordinator, number: u32) -> DiningTable {
        c.tables()
            .add_table(DiningTableCreate {
                number: Some(number),
                ..Default::default()
            })
            .unwrap()
    }

    fn item(id: &str, price: f64, quantity: i32) -> OrderItem {
        OrderItem {
            id: id.into(),
            name: id.into(),
            price,
            quantity,
        }
    }

    fn order_for(table_number: u32, customers: u32) -> OrderCreate {
        OrderCreate {
            table_number: Some(table_number),
            customers: Some(customers),
            items: vec![item("a", 100.0, 2)],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_occupies_table() {
        let c = coordinator();
        add_table(&c, 5);
        let order = c.create_order_and_occupy_table(order_for(5, 2)).unwrap();

        assert_eq!(order.total, 200.0);
        let table = c.tables().by_number(5).unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.order_id.as_deref(), Some(order.id.as_str()));
        assert_eq!(table.customers, 2);
    }

    #[test]
    fn test_create_without_table_keeps_order() {
        let c = coordinator();
        let order = c.create_order_and_occupy_table(order_for(9, 1)).unwrap();
        assert!(c.orders().get(&order.id).is_some());
        assert!(c.tables().is_empty());
    }

    #[test]
    fn test_create_rejects_occupied_table() {
        let c = coordinator();
        add_table(&c, 1);
        let first = c.create_order_and_occupy_table(order_for(1, 2)).unwrap();

        let err = c.create_order_and_occupy_table(order_for(1, 3)).unwrap_err();
        assert!(matches!(err, AppError::TableOccupied(_)));
        assert_eq!(c.orders().len(), 1);
        assert_eq!(
            c.tables().by_number(1).unwrap().order_id.as_deref(),
            Some(first.id.as_str())
        );
    }

    #[test]
    fn test_invalid_order_leaves_table_alone() {
        let c = coordinator();
        add_table(&c, 1);
        let err = c
            .create_order_and_occupy_table(OrderCreate {
                items: vec![],
                ..order_for(1, 2)
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(c.tables().by_number(1).unwrap().status, TableStatus::Available);
    }

    #[test]
    fn test_create_only_accepts_pending_status() {
        let c = coordinator();
        add_table(&c, 1);
        for status in [OrderStatus::Cancelled, OrderStatus::Paid, OrderStatus::Completed] {
            let err = c
                .create_order_and_occupy_table(OrderCreate {
                    status: Some(status),
                    ..order_for(1, 2)
                })
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{status} accepted");
        }
        assert!(c.orders().is_empty());
        assert!(!c.tables().by_number(1).unwrap().is_occupied());

        let order = c
            .create_order_and_occupy_table(OrderCreate {
                status: Some(OrderStatus::Pending),
                ..order_for(1, 2)
            })
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(c.check_consistency().is_clean());
    }

    #[test]
    fn test_full_lifecycle_then_settle() {
        let c = coordinator();
        add_table(&c, 5);
        let order = c.create_order_and_occupy_table(order_for(5, 2)).unwrap();

        let err = c.settle_and_release(&order.id).unwrap_err();
        assert!(err.to_string().contains("not yet settled"));

        c.start_preparation(&order.id).unwrap();
        assert!(c.settle_and_release(&order.id).is_err());
        let completed = c.complete_order(&order.id).unwrap();
        assert_eq!(completed.completed_at, Some(1_000));
        assert!(c.settle_and_release(&order.id).is_err());
        c.mark_paid(&order.id).unwrap();

        let settled = c.settle_and_release(&order.id).unwrap();
        assert_eq!(settled.status, OrderStatus::Paid);
        let table = c.tables().by_number(5).unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.order_id.is_none());
        assert!(c.orders().get(&order.id).is_some());
    }

    #[test]
    fn test_paid_only_from_completed() {
        let c = coordinator();
        add_table(&c, 1);
        let order = c.create_order_and_occupy_table(order_for(1, 1)).unwrap();

        assert!(matches!(c.mark_paid(&order.id), Err(AppError::BusinessRule(_))));
        c.start_preparation(&order.id).unwrap();
        assert!(matches!(c.mark_paid(&order.id), Err(AppError::BusinessRule(_))));
        assert_eq!(c.orders().get(&order.id).unwrap().status, OrderStatus::Preparing);
    }

    #[test]
    fn test_cancel_releases_table() {
        let c = coordinator();
        add_table(&c, 2);
        let order = c.create_order_and_occupy_table(order_for(2, 2)).unwrap();
        c.start_preparation(&order.id).unwrap();
        c.cancel_order(&order.id).unwrap();

        assert!(!c.tables().by_number(2).unwrap().is_occupied());

        // completed orders cannot be cancelled
        let other = c.create_order_and_occupy_table(order_for(2, 1)).unwrap();
        c.start_preparation(&other.id).unwrap();
        c.complete_order(&other.id).unwrap();
        assert!(c.cancel_order(&other.id).is_err());
        assert!(c.tables().by_number(2).unwrap().is_occupied());
    }

    #[test]
    fn test_delete_releases_table_and_is_safe_without_one() {
        let c = coordinator();
        add_table(&c, 3);
        let order = c.create_order_and_occupy_table(order_for(3, 2)).unwrap();
        c.delete_order_and_release_table(&order.id).unwrap();
        assert!(!c.tables().by_number(3).unwrap().is_occupied());

        let orphan = c.create_order_and_occupy_table(order_for(42, 1)).unwrap();
        assert!(c.delete_order_and_release_table(&orphan.id).is_ok());
        assert!(matches!(
            c.delete_order_and_release_table(&orphan.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_amend_merges_items_and_mirrors_customers() {
        let c = coordinator();
        add_table(&c, 4);
        let order = c.create_order_and_occupy_table(order_for(4, 2)).unwrap();

        let amended = c
            .amend_existing_order(
                &order.id,
                OrderAmendment {
                    add_items: vec![item("a", 100.0, 1), item("b", 7.5, 2)],
                    customers: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(amended.items.len(), 2);
        assert_eq!(amended.items[0].quantity, 3);
        assert_eq!(amended.total, 315.0);
        assert_eq!(c.tables().by_number(4).unwrap().customers, 3);
    }

    #[test]
    fn test_amend_rejects_paid_order() {
        let c = coordinator();
        add_table(&c, 4);
        let order = c.create_order_and_occupy_table(order_for(4, 2)).unwrap();
        c.start_preparation(&order.id).unwrap();
        c.complete_order(&order.id).unwrap();
        c.mark_paid(&order.id).unwrap();

        let err = c
            .amend_existing_order(
                &order.id,
                OrderAmendment {
                    add_items: vec![item("b", 5.0, 1)],
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        assert_eq!(c.orders().get(&order.id).unwrap().items.len(), 1);
    }

    #[test]
    fn test_move_order() {
        let c = coordinator();
        add_table(&c, 1);
        add_table(&c, 2);
        add_table(&c, 3);
        let a = c.create_order_and_occupy_table(order_for(1, 2)).unwrap();
        c.create_order_and_occupy_table(order_for(3, 2)).unwrap();

        let moved = c.move_order(&a.id, 2).unwrap();
        assert_eq!(moved.table_number, 2);
        assert!(!c.tables().by_number(1).unwrap().is_occupied());
        assert_eq!(
            c.tables().by_number(2).unwrap().order_id.as_deref(),
            Some(a.id.as_str())
        );

        assert!(matches!(c.move_order(&a.id, 3), Err(AppError::TableOccupied(_))));
    }

    #[test]
    fn test_stale_reference_does_not_block_new_order() {
        let c = coordinator();
        add_table(&c, 1);
        let order = c.create_order_and_occupy_table(order_for(1, 2)).unwrap();
        // order vanishes without going through the coordinator
        c.orders().delete_order(&order.id).unwrap();

        let next = c.create_order_and_occupy_table(order_for(1, 1)).unwrap();
        assert_eq!(
            c.tables().by_number(1).unwrap().order_id.as_deref(),
            Some(next.id.as_str())
        );
    }
}
