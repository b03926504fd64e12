//! OrderStore - authoritative in-memory order collection
//!
//! Every accepted mutation is applied under one write lock, persisted as a
//! full `orders` snapshot and announced on the change bus. Rejected
//! mutations are logged and leave the collection untouched.
//!
//! Status and table linkage are only reachable through crate-private
//! methods used by the coordinator.

use parking_lot::RwLock;
use shared::models::{Order, OrderCreate, OrderStatus, OrderUpdate};
use shared::util::Clock;
use std::sync::Arc;

use super::money;
use crate::message::{ChangeAction, ChangeBus, Collection};
use crate::storage::{self, LocalStorage, Persist, StorageResult, keys};
use crate::utils::{AppError, AppResult};

pub struct OrderStore {
    orders: RwLock<Vec<Order>>,
    persist: Arc<dyn Persist>,
    clock: Arc<dyn Clock>,
    bus: ChangeBus,
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("orders", &self.orders.read().len())
            .finish()
    }
}

impl OrderStore {
    /// Empty store
    pub fn new(persist: Arc<dyn Persist>, clock: Arc<dyn Clock>, bus: ChangeBus) -> Self {
        Self {
            orders: RwLock::new(Vec::new()),
            persist,
            clock,
            bus,
        }
    }

    /// Rehydrate from the most recent local snapshot
    pub fn load(
        storage: &LocalStorage,
        persist: Arc<dyn Persist>,
        clock: Arc<dyn Clock>,
        bus: ChangeBus,
    ) -> StorageResult<Self> {
        let orders: Vec<Order> = storage::load_collection(storage, keys::ORDERS)?;
        tracing::info!(count = orders.len(), "Orders rehydrated");
        let store = Self::new(persist, clock, bus);
        *store.orders.write() = orders;
        Ok(store)
    }

    // ========== Mutations ==========

    /// Validate and append a new order
    pub fn add_order(&self, input: OrderCreate) -> AppResult<Order> {
        let mut orders = self.orders.write();

        let order = match self.build_order(&orders, input) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected new order");
                return Err(e);
            }
        };

        orders.push(order.clone());
        self.commit(&orders, &order.id, ChangeAction::Upsert);
        tracing::info!(
            order_id = %order.id,
            table_number = order.table_number,
            total = order.total,
            "Order added"
        );
        Ok(order)
    }

    fn build_order(&self, existing: &[Order], input: OrderCreate) -> AppResult<Order> {
        let table_number = match input.table_number {
            Some(n) if n >= 1 => n,
            _ => return Err(AppError::validation("tableNumber is required")),
        };
        // New orders always start at `pending`; later states go through transitions
        if let Some(status) = input.status.filter(|s| *s != OrderStatus::Pending) {
            return Err(AppError::validation(format!(
                "New orders start as pending, got {status}"
            )));
        }
        money::validate_items(&input.items)?;

        let customers = input.customers.unwrap_or(1);
        if customers == 0 {
            return Err(AppError::validation("customers must be at least 1"));
        }

        let subtotal = money::subtotal(&input.items);
        let total = match input.total {
            Some(total) => {
                money::validate_total(total)?;
                total
            }
            None => subtotal,
        };

        let id = match input.id {
            Some(id) if !id.trim().is_empty() => {
                if existing.iter().any(|o| o.id == id) {
                    return Err(AppError::conflict(format!("Order {id} already exists")));
                }
                id
            }
            _ => shared::util::new_order_id(),
        };

        let now = self.clock.now_millis();
        Ok(Order {
            id,
            table_number,
            customers,
            items: input.items,
            subtotal,
            total,
            status: OrderStatus::Pending,
            notes: input.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Merge a partial update into an existing order
    ///
    /// Supplying `items` recomputes subtotal and total, unless a `total` is
    /// supplied alongside them.
    pub fn update_order(&self, id: &str, update: OrderUpdate) -> AppResult<Order> {
        self.mutate(id, |order| {
            if let Some(customers) = update.customers {
                if customers == 0 {
                    return Err(AppError::validation("customers must be at least 1"));
                }
            }
            if let Some(items) = &update.items {
                money::validate_items(items)?;
            }
            if let Some(total) = update.total {
                money::validate_total(total)?;
            }

            if let Some(customers) = update.customers {
                order.customers = customers;
            }
            if let Some(items) = update.items {
                order.subtotal = money::subtotal(&items);
                order.total = update.total.unwrap_or(order.subtotal);
                order.items = items;
            } else if let Some(total) = update.total {
                order.total = total;
            }
            if let Some(notes) = update.notes {
                order.notes = notes;
            }
            Ok(())
        })
    }

    /// Remove an order; table state is the coordinator's concern
    pub fn delete_order(&self, id: &str) -> AppResult<Order> {
        let mut orders = self.orders.write();
        let Some(index) = orders.iter().position(|o| o.id == id) else {
            tracing::warn!(order_id = %id, "Delete requested for unknown order");
            return Err(AppError::not_found(format!("Order {id}")));
        };
        let removed = orders.remove(index);
        self.commit(&orders, id, ChangeAction::Delete);
        tracing::info!(order_id = %id, "Order deleted");
        Ok(removed)
    }

    /// Bulk replace (sync pull, backup restore); not announced on the bus
    pub fn set_orders(&self, list: Vec<Order>) {
        let mut orders = self.orders.write();
        *orders = list;
        storage::persist_collection(self.persist.as_ref(), keys::ORDERS, &*orders);
        tracing::info!(count = orders.len(), "Orders replaced");
    }

    /// Move an order along its lifecycle (guard lives in the coordinator)
    pub(crate) fn set_status(&self, id: &str, status: OrderStatus) -> AppResult<Order> {
        let now = self.clock.now_millis();
        self.mutate(id, |order| {
            order.status = status;
            if status == OrderStatus::Completed {
                order.completed_at = Some(now);
            }
            Ok(())
        })
    }

    /// Re-point an order at another table (linkage owned by the coordinator)
    pub(crate) fn set_table_number(&self, id: &str, table_number: u32) -> AppResult<Order> {
        if table_number == 0 {
            return Err(AppError::validation("tableNumber must be at least 1"));
        }
        self.mutate(id, |order| {
            order.table_number = table_number;
            Ok(())
        })
    }

    /// Apply `f` to one order atomically; on error nothing changes
    fn mutate(
        &self,
        id: &str,
        f: impl FnOnce(&mut Order) -> AppResult<()>,
    ) -> AppResult<Order> {
        let mut orders = self.orders.write();
        let Some(index) = orders.iter().position(|o| o.id == id) else {
            tracing::warn!(order_id = %id, "Update requested for unknown order");
            return Err(AppError::not_found(format!("Order {id}")));
        };

        let mut draft = orders[index].clone();
        if let Err(e) = f(&mut draft) {
            tracing::warn!(order_id = %id, error = %e, "Rejected order update");
            return Err(e);
        }
        draft.updated_at = self.clock.now_millis();
        orders[index] = draft.clone();
        self.commit(&orders, id, ChangeAction::Upsert);
        Ok(draft)
    }

    fn commit(&self, orders: &[Order], id: &str, action: ChangeAction) {
        storage::persist_collection(self.persist.as_ref(), keys::ORDERS, orders);
        self.bus.publish(Collection::Orders, id, action);
    }

    // ========== Queries ==========

    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.read().iter().find(|o| o.id == id).cloned()
    }

    pub fn by_table(&self, table_number: u32) -> Vec<Order> {
        self.orders
            .read()
            .iter()
            .filter(|o| o.table_number == table_number)
            .cloned()
            .collect()
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .read()
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    /// Orders neither paid nor cancelled
    pub fn live(&self) -> Vec<Order> {
        self.orders
            .read()
            .iter()
            .filter(|o| o.is_live())
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.read().clone()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}
