//! End-to-end order/table flows against an in-process remote

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use shared::models::{
    DiningTable, DiningTableCreate, Order, OrderCreate, OrderItem, OrderStatus, TableStatus,
};
use shared::util::ManualClock;
use taproom_edge::cloud_sync::MemoryRemote;
use taproom_edge::message::{ChangeAction, Collection};
use taproom_edge::offline::{QueueEntry, QueueExecutor};
use taproom_edge::storage::LocalStorage;
use taproom_edge::{AppError, AppResult, AppState, Config};

fn state_with(remote: Arc<MemoryRemote>) -> AppState {
    AppState::assemble(
        &Config::with_work_dir("unused"),
        LocalStorage::in_memory().unwrap(),
        remote,
        Arc::new(ManualClock::new(1_700_000_000_000)),
    )
    .unwrap()
}

fn item(id: &str, price: f64, quantity: i32) -> OrderItem {
    OrderItem {
        id: id.into(),
        name: id.to_uppercase(),
        price,
        quantity,
    }
}

fn table(number: u32) -> DiningTableCreate {
    DiningTableCreate {
        number: Some(number),
        ..Default::default()
    }
}

fn open_order(state: &AppState, table_number: u32) -> Order {
    state
        .coordinator
        .create_order_and_occupy_table(OrderCreate {
            table_number: Some(table_number),
            items: vec![item("a", 100.0, 2)],
            customers: Some(2),
            ..Default::default()
        })
        .unwrap()
}

/// Occupied tables reference a non-cancelled order; free tables reference none
fn assert_linkage_invariant(state: &AppState) {
    for t in state.tables.all() {
        if t.status == TableStatus::Occupied {
            let order_id = t.order_id.as_deref().expect("occupied table without orderId");
            let order = state.orders.get(order_id).expect("occupied table references missing order");
            assert_ne!(order.status, OrderStatus::Cancelled, "table {} holds a cancelled order", t.number);
        } else {
            assert_eq!(t.order_id, None, "free table {} still references an order", t.number);
        }
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn scenario_a_create_order_occupies_table() {
    let state = state_with(Arc::new(MemoryRemote::new()));
    state.tables.add_table(table(5)).unwrap();

    let order = open_order(&state, 5);
    assert_eq!(order.total, 200.0);

    let t = state.tables.by_number(5).unwrap();
    assert_eq!(t.status, TableStatus::Occupied);
    assert_eq!(t.order_id.as_deref(), Some(order.id.as_str()));
    assert_linkage_invariant(&state);
}

#[test]
fn scenario_b_settle_releases_table_and_keeps_order() {
    let state = state_with(Arc::new(MemoryRemote::new()));
    state.tables.add_table(table(5)).unwrap();
    let order = open_order(&state, 5);

    for status in [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Completed] {
        if status != OrderStatus::Pending {
            state.coordinator.transition(&order.id, status).unwrap();
        }
        let err = state.coordinator.settle_and_release(&order.id).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(ref m) if m.contains("not yet settled")));
        assert!(state.tables.by_number(5).unwrap().is_occupied());
    }

    state.coordinator.mark_paid(&order.id).unwrap();
    state.coordinator.settle_and_release(&order.id).unwrap();

    let t = state.tables.by_number(5).unwrap();
    assert_eq!(t.status, TableStatus::Available);
    assert_eq!(t.order_id, None);
    assert_eq!(state.orders.get(&order.id).unwrap().status, OrderStatus::Paid);
    assert_linkage_invariant(&state);
}

#[tokio::test]
async fn scenario_c_partial_push_then_pull() {
    let remote = Arc::new(MemoryRemote::new());
    let state = state_with(remote.clone());
    let ok = state
        .orders
        .add_order(OrderCreate {
            id: Some("order-ok".into()),
            table_number: Some(1),
            items: vec![item("a", 4.0, 1)],
            ..Default::default()
        })
        .unwrap();
    state
        .orders
        .add_order(OrderCreate {
            id: Some("order-bad".into()),
            table_number: Some(2),
            items: vec![item("b", 4.0, 1)],
            ..Default::default()
        })
        .unwrap();
    remote.fail_writes_for("order-bad");

    let result = state.push_all().await;
    assert!(!result.success);
    let orders = result.data.unwrap().orders;
    assert_eq!(orders.success, 1);
    assert_eq!(orders.failed, 1);
    assert_eq!(orders.errors.len(), 1);
    assert!(orders.errors[0].contains("order-bad"));

    let pulled = state.sync.pull().await;
    let remote_orders = pulled.data.unwrap().orders.unwrap();
    assert_eq!(remote_orders, vec![ok]);
}

struct AlwaysFails {
    attempts: AtomicU32,
}

#[async_trait]
impl QueueExecutor for AlwaysFails {
    async fn execute(&self, _entry: &QueueEntry) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Remote("503 from remote".into()))
    }
}

#[tokio::test]
async fn scenario_d_queue_entry_dropped_after_three_failures() {
    let state = state_with(Arc::new(MemoryRemote::new()));
    let executor = AlwaysFails {
        attempts: AtomicU32::new(0),
    };
    let entry = state
        .queue
        .enqueue(Collection::Orders, ChangeAction::Upsert, "o-1", json!({"id": "o-1"}));

    for _ in 0..2 {
        let report = state.queue.replay(&executor).await;
        assert!(report.dropped.is_empty());
        assert_eq!(report.remaining, 1);
    }
    let report = state.queue.replay(&executor).await;
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].id, entry.id);
    assert!(state.queue.is_empty());

    state.queue.replay(&executor).await;
    assert_eq!(executor.attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn release_table_is_idempotent() {
    let state = state_with(Arc::new(MemoryRemote::new()));
    state.tables.add_table(table(1)).unwrap();
    let order = open_order(&state, 1);

    assert_eq!(state.tables.release_table(&order.id), 1);
    let after_first: Vec<DiningTable> = state.tables.all();
    assert_eq!(state.tables.release_table(&order.id), 0);
    assert_eq!(state.tables.all(), after_first);
}

#[test]
fn add_order_boundaries() {
    let state = state_with(Arc::new(MemoryRemote::new()));
    let create = |items: Vec<OrderItem>| {
        state.orders.add_order(OrderCreate {
            table_number: Some(1),
            items,
            ..Default::default()
        })
    };

    assert!(matches!(create(vec![]), Err(AppError::Validation(_))));
    assert!(matches!(create(vec![item("a", 5.0, 0)]), Err(AppError::Validation(_))));
    assert_eq!(state.orders.len(), 0);

    let free = create(vec![item("water", 0.0, 1)]).unwrap();
    assert_eq!(free.total, 0.0);
}

#[tokio::test]
async fn push_pull_round_trip_preserves_records() {
    let remote = Arc::new(MemoryRemote::new());
    let state = state_with(remote);
    state.tables.add_table(table(1)).unwrap();
    state.tables.add_table(table(2)).unwrap();
    open_order(&state, 1);
    state
        .coordinator
        .create_order_and_occupy_table(OrderCreate {
            table_number: Some(2),
            items: vec![item("a", 3.5, 1), item("b", 1.25, 4)],
            notes: Some("no ice".into()),
            ..Default::default()
        })
        .unwrap();

    let local_orders = state.orders.all();
    let local_tables = state.tables.all();
    assert!(state.push_all().await.success);

    let pulled = state.pull_and_apply().await;
    assert!(pulled.success);

    let mut orders = state.orders.all();
    let mut expected_orders = local_orders;
    orders.sort_by(|a, b| a.id.cmp(&b.id));
    expected_orders.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(orders, expected_orders);

    let mut tables = state.tables.all();
    tables.sort_by_key(|t| t.id);
    assert_eq!(tables, local_tables);
    assert_linkage_invariant(&state);
}

#[tokio::test]
async fn background_sync_mirrors_and_queues_while_offline() {
    let remote = Arc::new(MemoryRemote::new());
    let state = state_with(remote.clone());
    let tasks = state.start_background_tasks();
    eventually("first probe", || state.connectivity.is_online()).await;

    state.tables.add_table(table(1)).unwrap();
    eventually("table mirrored", || remote.len(Collection::Tables) == 1).await;

    remote.set_online(false);
    state.connectivity.check().await;
    assert!(!state.connectivity.is_online());

    let order = open_order(&state, 1);
    eventually("changes queued", || state.queue.len() >= 2).await;
    assert_eq!(remote.len(Collection::Orders), 0);

    remote.set_online(true);
    state.connectivity.check().await;
    eventually("queue replayed", || state.queue.is_empty()).await;
    assert!(remote.row(Collection::Orders, &order.id).is_some());

    tasks.shutdown().await;
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_work_dir(dir.path().to_string_lossy());

    let order_id = {
        let state = AppState::initialize(&config).unwrap();
        state.tables.add_table(table(3)).unwrap();
        open_order(&state, 3).id
    };

    let state = AppState::initialize(&config).unwrap();
    assert_eq!(state.orders.get(&order_id).unwrap().total, 200.0);
    let t = state.tables.by_number(3).unwrap();
    assert_eq!(t.order_id.as_deref(), Some(order_id.as_str()));
    assert!(state.coordinator.check_consistency().is_clean());
}
