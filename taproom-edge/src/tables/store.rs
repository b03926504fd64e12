//! TableStore - authoritative in-memory table collection

use parking_lot::RwLock;
use shared::models::{DiningTable, DiningTableCreate, DiningTableUpdate, TablePosition, TableStatus};
use shared::util::Clock;
use std::sync::Arc;

use crate::message::{ChangeAction, ChangeBus, Collection};
use crate::storage::{self, LocalStorage, Persist, StorageResult, keys};
use crate::utils::{AppError, AppResult};

const DEFAULT_MAX_CAPACITY: u32 = 4;

/// Floor-plan grid used for tables created without a position
const GRID_COLUMNS: u32 = 6;
const GRID_SPACING: f64 = 120.0;

pub struct TableStore {
    tables: RwLock<Vec<DiningTable>>,
    persist: Arc<dyn Persist>,
    clock: Arc<dyn Clock>,
    bus: ChangeBus,
}

impl std::fmt::Debug for TableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("tables", &self.tables.read().len())
            .finish()
    }
}

fn default_position(number: u32) -> TablePosition {
    let slot = number.saturating_sub(1);
    TablePosition {
        x: f64::from(slot % GRID_COLUMNS) * GRID_SPACING,
        y: f64::from(slot / GRID_COLUMNS) * GRID_SPACING,
    }
}

impl TableStore {
    pub fn new(persist: Arc<dyn Persist>, clock: Arc<dyn Clock>, bus: ChangeBus) -> Self {
        Self {
            tables: RwLock::new(Vec::new()),
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
        let tables: Vec<DiningTable> = storage::load_collection(storage, keys::TABLES)?;
        tracing::info!(count = tables.len(), "Tables rehydrated");
        let store = Self::new(persist, clock, bus);
        *store.tables.write() = tables;
        Ok(store)
    }

    // ========== Mutations ==========

    /// Create a table, synthesizing id/number/name/capacity/position
    pub fn add_table(&self, input: DiningTableCreate) -> AppResult<DiningTable> {
        let mut tables = self.tables.write();

        let table = match self.build_table(&tables, input) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected new table");
                return Err(e);
            }
        };

        tables.push(table.clone());
        self.commit(&tables, table.id, ChangeAction::Upsert);
        tracing::info!(table_id = table.id, number = table.number, "Table added");
        Ok(table)
    }

    fn build_table(&self, existing: &[DiningTable], input: DiningTableCreate) -> AppResult<DiningTable> {
        let id = match input.id {
            Some(id) if existing.iter().any(|t| t.id == id) => {
                return Err(AppError::conflict(format!("Table id {id} already exists")));
            }
            Some(id) => id,
            None => existing
                .iter()
                .map(|t| t.id)
                .max()
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| AppError::validation("No table id left, pass an explicit id"))?,
        };

        let number = match input.number {
            Some(0) => return Err(AppError::validation("number must be at least 1")),
            Some(n) if existing.iter().any(|t| t.number == n) => {
                return Err(AppError::conflict(format!("Table number {n} already exists")));
            }
            Some(n) => n,
            None => existing
                .iter()
                .map(|t| t.number)
                .max()
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| AppError::validation("No table number left, pass an explicit number"))?,
        };

        let max_capacity = input.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY);
        if max_capacity == 0 {
            return Err(AppError::validation("maxCapacity must be at least 1"));
        }

        let name = match input.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Table {number}"),
        };

        let now = self.clock.now_millis();
        Ok(DiningTable {
            id,
            number,
            name,
            status: TableStatus::Available,
            customers: 0,
            max_capacity,
            position: input.position.unwrap_or_else(|| default_position(number)),
            order_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Public partial update; never touches occupation
    pub fn update_table(&self, id: i64, update: DiningTableUpdate) -> AppResult<DiningTable> {
        if update.status == Some(TableStatus::Occupied) {
            let e = AppError::business_rule("Tables are occupied by creating an order for them");
            tracing::warn!(table_id = id, error = %e, "Rejected table update");
            return Err(e);
        }
        if let Some(status) = update.status {
            if self.get(id).is_some_and(|t| t.is_occupied()) {
                let e = AppError::business_rule(format!(
                    "Table {id} is occupied; settle or cancel its order before marking it {status}"
                ));
                tracing::warn!(table_id = id, error = %e, "Rejected table update");
                return Err(e);
            }
        }
        self.apply(id, update, None)
    }

    /// Merge a partial update and optionally set/clear `orderId`
    ///
    /// `order_id`: `None` leaves it, `Some(None)` clears it, `Some(Some(id))`
    /// sets it. The merged record must still satisfy "orderId iff occupied".
    pub(crate) fn apply(
        &self,
        id: i64,
        update: DiningTableUpdate,
        order_id: Option<Option<String>>,
    ) -> AppResult<DiningTable> {
        let mut tables = self.tables.write();
        let Some(index) = tables.iter().position(|t| t.id == id) else {
            tracing::warn!(table_id = id, "Update requested for unknown table");
            return Err(AppError::not_found(format!("Table {id}")));
        };

        let mut draft = tables[index].clone();
        if let Some(name) = update.name {
            draft.name = name;
        }
        if let Some(status) = update.status {
            draft.status = status;
        }
        if let Some(customers) = update.customers {
            draft.customers = customers;
        }
        if let Some(max_capacity) = update.max_capacity {
            draft.max_capacity = max_capacity;
        }
        if let Some(position) = update.position {
            draft.position = position;
        }
        if let Some(order_id) = order_id {
            draft.order_id = order_id;
        }

        let verdict = if draft.name.trim().is_empty() {
            Err(AppError::validation("name must not be empty"))
        } else if draft.max_capacity == 0 {
            Err(AppError::validation("maxCapacity must be at least 1"))
        } else if !draft.linkage_is_consistent() {
            Err(AppError::business_rule(format!(
                "Table {id} would be {} with orderId {:?}",
                draft.status, draft.order_id
            )))
        } else {
            Ok(())
        };
        if let Err(e) = verdict {
            tracing::warn!(table_id = id, error = %e, "Rejected table update");
            return Err(e);
        }

        if draft.customers > draft.max_capacity {
            tracing::debug!(
                table_id = id,
                customers = draft.customers,
                max_capacity = draft.max_capacity,
                "Table seated above capacity"
            );
        }

        draft.updated_at = self.clock.now_millis();
        tables[index] = draft.clone();
        self.commit(&tables, id, ChangeAction::Upsert);
        Ok(draft)
    }

    /// Occupy the table with `number` for `order_id`
    ///
    /// Fails with `TableOccupied` when another order already holds it.
    pub(crate) fn occupy(&self, number: u32, order_id: &str, customers: u32) -> AppResult<DiningTable> {
        let table = self
            .by_number(number)
            .ok_or_else(|| AppError::not_found(format!("Table number {number}")))?;

        if let Some(holder) = table.order_id.as_deref() {
            if holder != order_id {
                return Err(AppError::TableOccupied(format!(
                    "Table {number} is held by order {holder}"
                )));
            }
        }

        self.apply(
            table.id,
            DiningTableUpdate {
                status: Some(TableStatus::Occupied),
                customers: Some(customers),
                ..Default::default()
            },
            Some(Some(order_id.to_string())),
        )
    }

    /// Reset every table referencing `order_id` to available
    ///
    /// Returns how many tables were released. Calling it again is a no-op.
    pub fn release_table(&self, order_id: &str) -> usize {
        let mut tables = self.tables.write();
        let now = self.clock.now_millis();
        let mut released = Vec::new();

        for table in tables.iter_mut() {
            if table.order_id.as_deref() == Some(order_id) {
                table.status = TableStatus::Available;
                table.order_id = None;
                table.customers = 0;
                table.updated_at = now;
                released.push(table.id);
            }
        }

        if released.is_empty() {
            tracing::warn!(order_id = %order_id, "No table referenced order on release");
            return 0;
        }

        storage::persist_collection(self.persist.as_ref(), keys::TABLES, &*tables);
        for id in &released {
            self.bus.publish(Collection::Tables, id.to_string(), ChangeAction::Upsert);
        }
        tracing::info!(order_id = %order_id, count = released.len(), "Tables released");
        released.len()
    }

    pub fn delete_table(&self, id: i64) -> AppResult<DiningTable> {
        let mut tables = self.tables.write();
        let Some(index) = tables.iter().position(|t| t.id == id) else {
            tracing::warn!(table_id = id, "Delete requested for unknown table");
            return Err(AppError::not_found(format!("Table {id}")));
        };
        let removed = tables.remove(index);
        if removed.is_occupied() {
            tracing::warn!(
                table_id = id,
                order_id = ?removed.order_id,
                "Deleted an occupied table"
            );
        }
        self.commit(&tables, id, ChangeAction::Delete);
        tracing::info!(table_id = id, "Table deleted");
        Ok(removed)
    }

    /// Every table back to available, no order, no customers
    pub fn reset_all_tables(&self) {
        let mut tables = self.tables.write();
        let now = self.clock.now_millis();
        for table in tables.iter_mut() {
            table.status = TableStatus::Available;
            table.order_id = None;
            table.customers = 0;
            table.updated_at = now;
        }
        storage::persist_collection(self.persist.as_ref(), keys::TABLES, &*tables);
        for table in tables.iter() {
            self.bus.publish(Collection::Tables, table.id.to_string(), ChangeAction::Upsert);
        }
        tracing::info!(count = tables.len(), "All tables reset");
    }

    /// Bulk replace (sync pull, backup restore); not announced on the bus
    pub fn set_tables(&self, list: Vec<DiningTable>) {
        let inconsistent = list.iter().filter(|t| !t.linkage_is_consistent()).count();
        if inconsistent > 0 {
            tracing::warn!(inconsistent, "Replacing tables with inconsistent occupation");
        }
        let mut tables = self.tables.write();
        *tables = list;
        storage::persist_collection(self.persist.as_ref(), keys::TABLES, &*tables);
        tracing::info!(count = tables.len(), "Tables replaced");
    }

    fn commit(&self, tables: &[DiningTable], id: i64, action: ChangeAction) {
        storage::persist_collection(self.persist.as_ref(), keys::TABLES, tables);
        self.bus.publish(Collection::Tables, id.to_string(), action);
    }

    // ========== Queries ==========

    pub fn get(&self, id: i64) -> Option<DiningTable> {
        self.tables.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn by_number(&self, number: u32) -> Option<DiningTable> {
        self.tables.read().iter().find(|t| t.number == number).cloned()
    }

    /// Tables referencing `order_id` (normally zero or one)
    pub fn by_order(&self, order_id: &str) -> Vec<DiningTable> {
        self.tables
            .read()
            .iter()
            .filter(|t| t.order_id.as_deref() == Some(order_id))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<DiningTable> {
        self.tables.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ImmediatePersist;
    use shared::util::ManualClock;

    fn store_on(storage: &LocalStorage) -> TableStore {
        TableStore::load(
            storage,
            Arc::new(ImmediatePersist::new(storage.clone())),
            Arc::new(ManualClock::new(10)),
            ChangeBus::new(),
        )
        .unwrap()
    }

    fn test_store() -> TableStore {
        store_on(&LocalStorage::in_memory().unwrap())
    }

    fn numbered(number: u32) -> DiningTableCreate {
        DiningTableCreate {
            number: Some(number),
            ..Default::default()
        }
    }

    fn at_limit(id: i64, number: u32) -> DiningTable {
        DiningTable {
            id,
            number,
            name: "Last".into(),
            status: TableStatus::Available,
            customers: 0,
            max_capacity: 4,
            position: TablePosition::default(),
            order_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_generated_id_and_number_stop_at_limit() {
        let store = test_store();
        store.set_tables(vec![at_limit(i64::MAX, 1)]);
        let err = store.add_table(numbered(2)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("table id")));
        store.add_table(DiningTableCreate { id: Some(7), ..numbered(2) }).unwrap();

        let store = test_store();
        store.set_tables(vec![at_limit(1, u32::MAX)]);
        let err = store.add_table(DiningTableCreate::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("table number")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_table_defaults() {
        let store = test_store();
        let first = store.add_table(DiningTableCreate::default()).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.number, 1);
        assert_eq!(first.name, "Table 1");
        assert_eq!(first.max_capacity, 4);
        assert_eq!(first.status, TableStatus::Available);
        assert_eq!(first.customers, 0);
        assert!(first.order_id.is_none());

        let fifth = store.add_table(numbered(5)).unwrap();
        assert_eq!(fifth.id, 2);
        assert_eq!(fifth.name, "Table 5");
        assert_eq!(fifth.position, TablePosition { x: 480.0, y: 0.0 });

        let next = store.add_table(DiningTableCreate::default()).unwrap();
        assert_eq!(next.number, 6);
    }

    #[test]
    fn test_add_table_rejects_duplicate_number() {
        let store = test_store();
        store.add_table(numbered(3)).unwrap();
        let err = store.add_table(numbered(3)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_public_update_cannot_touch_occupation() {
        let store = test_store();
        let table = store.add_table(numbered(1)).unwrap();

        let err = store
            .update_table(
                table.id,
                DiningTableUpdate {
                    status: Some(TableStatus::Occupied),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        store.occupy(1, "o-1", 2).unwrap();
        let err = store
            .update_table(
                table.id,
                DiningTableUpdate {
                    status: Some(TableStatus::Available),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        assert_eq!(store.get(table.id).unwrap().order_id.as_deref(), Some("o-1"));

        // non-status fields stay editable while occupied
        let renamed = store
            .update_table(
                table.id,
                DiningTableUpdate {
                    name: Some("Window".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Window");
        assert!(renamed.is_occupied());
    }

    #[test]
    fn test_update_reserved_and_cleaning() {
        let store = test_store();
        let table = store.add_table(numbered(2)).unwrap();
        for status in [TableStatus::Reserved, TableStatus::Cleaning, TableStatus::Available] {
            let updated = store
                .update_table(
                    table.id,
                    DiningTableUpdate {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert_eq!(updated.status, status);
        }
    }

    #[test]
    fn test_apply_rejects_broken_linkage() {
        let store = test_store();
        let table = store.add_table(numbered(1)).unwrap();

        let err = store
            .apply(table.id, DiningTableUpdate::default(), Some(Some("o-1".into())))
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        store.occupy(1, "o-1", 2).unwrap();
        let err = store
            .apply(table.id, DiningTableUpdate::default(), Some(None))
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        assert!(store.get(table.id).unwrap().linkage_is_consistent());
    }

    #[test]
    fn test_occupy_rejects_other_holder() {
        let store = test_store();
        store.add_table(numbered(7)).unwrap();
        store.occupy(7, "o-1", 3).unwrap();

        let err = store.occupy(7, "o-2", 1).unwrap_err();
        assert!(matches!(err, AppError::TableOccupied(_)));

        // re-occupying for the same order just refreshes customers
        let table = store.occupy(7, "o-1", 4).unwrap();
        assert_eq!(table.customers, 4);

        assert!(matches!(store.occupy(99, "o-1", 1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = test_store();
        store.add_table(numbered(1)).unwrap();
        store.occupy(1, "o-1", 2).unwrap();

        assert_eq!(store.release_table("o-1"), 1);
        let table = store.by_number(1).unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.order_id.is_none());
        assert_eq!(table.customers, 0);

        assert_eq!(store.release_table("o-1"), 0);
        assert_eq!(store.by_number(1).unwrap(), table);
    }

    #[test]
    fn test_release_covers_every_referencing_table() {
        let store = test_store();
        store.set_tables(vec![
            DiningTable {
                id: 1,
                number: 1,
                name: "Table 1".into(),
                status: TableStatus::Occupied,
                customers: 2,
                max_capacity: 4,
                position: TablePosition::default(),
                order_id: Some("o-1".into()),
                created_at: 0,
                updated_at: 0,
            },
            DiningTable {
                id: 2,
                number: 2,
                name: "Table 2".into(),
                status: TableStatus::Occupied,
                customers: 2,
                max_capacity: 4,
                position: TablePosition::default(),
                order_id: Some("o-1".into()),
                created_at: 0,
                updated_at: 0,
            },
        ]);
        assert_eq!(store.release_table("o-1"), 2);
        assert!(store.by_order("o-1").is_empty());
    }

    #[test]
    fn test_delete_and_reset() {
        let store = test_store();
        let a = store.add_table(numbered(1)).unwrap();
        store.add_table(numbered(2)).unwrap();
        store.occupy(2, "o-9", 2).unwrap();

        store.delete_table(a.id).unwrap();
        assert!(matches!(store.delete_table(a.id), Err(AppError::NotFound(_))));

        store.reset_all_tables();
        let table = store.by_number(2).unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.order_id.is_none());
    }

    #[test]
    fn test_rehydrates_from_snapshot() {
        let storage = LocalStorage::in_memory().unwrap();
        {
            let store = store_on(&storage);
            store.add_table(numbered(4)).unwrap();
            store.occupy(4, "o-1", 2).unwrap();
        }
        let store = store_on(&storage);
        let table = store.by_number(4).unwrap();
        assert!(table.is_occupied());
        assert_eq!(table.order_id.as_deref(), Some("o-1"));
    }
}
