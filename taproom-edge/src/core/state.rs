//! AppState - 组合根
//!
//! Builds every store and service once, with injected storage, clock and
//! remote, and hands them out as cheap clones. Nothing in the crate reaches
//! for global state.

use parking_lot::Mutex;
use shared::util::{Clock, SystemClock};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{MemberStore, MenuStore, SettingsStore};
use crate::cloud_sync::{
    MemoryRemote, PostgrestRemote, PullReport, PushReport, RemoteStore, SyncResult, SyncService,
    SyncSnapshot,
};
use crate::coordinator::Coordinator;
use crate::core::Config;
use crate::core::tasks::BackgroundTasks;
use crate::message::ChangeBus;
use crate::offline::{ConnectivityMonitor, OfflineQueue};
use crate::orders::OrderStore;
use crate::storage::{
    CoalescingPersist, FileBackend, ImmediatePersist, LocalStorage, Persist, PersistWorker,
    RedbBackend,
};
use crate::tables::TableStore;
use crate::utils::{AppError, AppResult};

const DATABASE_FILE: &str = "taproom.redb";
const FALLBACK_DIR: &str = "snapshots";

/// 应用状态
///
/// | 字段 | 说明 |
/// |------|------|
/// | orders / tables | 订单、桌台（只通过 coordinator 联动） |
/// | menu / members / settings | 目录类数据 |
/// | sync / queue / connectivity | 远端同步与离线层 |
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: LocalStorage,
    pub clock: Arc<dyn Clock>,
    pub bus: ChangeBus,
    pub orders: Arc<OrderStore>,
    pub tables: Arc<TableStore>,
    pub menu: Arc<MenuStore>,
    pub members: Arc<MemberStore>,
    pub settings: Arc<SettingsStore>,
    pub coordinator: Coordinator,
    pub sync: Arc<SyncService>,
    pub queue: Arc<OfflineQueue>,
    pub connectivity: Arc<ConnectivityMonitor>,
    persister: Option<CoalescingPersist>,
    persist_worker: Arc<Mutex<Option<PersistWorker>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("work_dir", &self.config.work_dir)
            .field("orders", &self.orders.len())
            .field("tables", &self.tables.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

/// redb primary plus JSON-file fallback under `data_dir`
fn open_storage(data_dir: &Path) -> AppResult<LocalStorage> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| AppError::Storage(format!("Cannot create {}: {e}", data_dir.display())))?;
    let primary = RedbBackend::open(data_dir.join(DATABASE_FILE))?;
    let fallback = FileBackend::new(data_dir.join(FALLBACK_DIR))?;
    Ok(LocalStorage::new(Arc::new(primary), Some(Arc::new(fallback))))
}

fn build_remote(config: &Config) -> AppResult<Arc<dyn RemoteStore>> {
    match &config.remote_url {
        Some(url) => {
            let remote = PostgrestRemote::new(url, &config.remote_api_key, config.request_timeout())
                .map_err(|e| AppError::Remote(e.to_string()))?;
            tracing::info!(url = %url, "Using PostgREST remote");
            Ok(Arc::new(remote))
        }
        None => {
            tracing::info!("REMOTE_URL not set, using in-process remote");
            Ok(Arc::new(MemoryRemote::new()))
        }
    }
}

impl AppState {
    /// 初始化应用状态（存储、远端由配置决定）
    pub fn initialize(config: &Config) -> AppResult<Self> {
        let storage = open_storage(&config.data_dir())?;
        let remote = build_remote(config)?;
        Self::assemble(config, storage, remote, Arc::new(SystemClock))
    }

    /// Wire everything onto the given storage, remote and clock
    pub fn assemble(
        config: &Config,
        storage: LocalStorage,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let (persister, persist_worker) = if config.persist_debounce_ms == 0 {
            (None, None)
        } else {
            let (sink, worker) = CoalescingPersist::new(storage.clone(), config.persist_debounce());
            (Some(sink), Some(worker))
        };
        let persist: Arc<dyn Persist> = match &persister {
            Some(sink) => Arc::new(sink.clone()),
            None => Arc::new(ImmediatePersist::new(storage.clone())),
        };

        let bus = ChangeBus::new();
        let orders = Arc::new(OrderStore::load(&storage, persist.clone(), clock.clone(), bus.clone())?);
        let tables = Arc::new(TableStore::load(&storage, persist.clone(), clock.clone(), bus.clone())?);
        let menu = Arc::new(MenuStore::load(&storage, persist.clone(), bus.clone())?);
        let members = Arc::new(MemberStore::load(&storage, persist.clone(), clock.clone(), bus.clone())?);
        let settings = Arc::new(SettingsStore::load(&storage, persist)?);
        let coordinator = Coordinator::new(orders.clone(), tables.clone());

        let sync = Arc::new(SyncService::new(
            remote,
            config.probe_attempts,
            config.probe_backoff(),
        ));
        let queue = Arc::new(OfflineQueue::load(&storage, clock.clone(), config.offline_max_retries)?);
        let connectivity = Arc::new(ConnectivityMonitor::new(
            sync.clone(),
            clock.clone(),
            config.connectivity_interval(),
        ));

        let state = Self {
            config: Arc::new(config.clone()),
            storage,
            clock,
            bus,
            orders,
            tables,
            menu,
            members,
            settings,
            coordinator,
            sync,
            queue,
            connectivity,
            persister,
            persist_worker: Arc::new(Mutex::new(persist_worker)),
        };

        let report = state.coordinator.check_consistency();
        tracing::info!(
            orders = report.orders_checked,
            tables = report.tables_checked,
            drift = report.issues.len(),
            queued = state.queue.len(),
            "AppState initialized"
        );
        Ok(state)
    }

    /// Start persister, connectivity, sync and offline workers
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let worker = self.persist_worker.lock().take();
        super::tasks::start(self, worker)
    }

    /// Everything the remote mirrors
    pub fn local_snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            orders: self.orders.all(),
            tables: self.tables.all(),
            menu_items: self.menu.all(),
            members: self.members.all(),
        }
    }

    pub async fn push_all(&self) -> SyncResult<PushReport> {
        self.sync.push(&self.local_snapshot()).await
    }

    /// Pull from the remote and bulk-replace every collection that arrived
    ///
    /// A collection whose fetch failed keeps its local contents.
    pub async fn pull_and_apply(&self) -> SyncResult<PullReport> {
        let result = self.sync.pull().await;
        if let Some(report) = &result.data {
            if let Some(orders) = &report.orders {
                self.orders.set_orders(orders.clone());
            }
            if let Some(tables) = &report.tables {
                self.tables.set_tables(tables.clone());
            }
            if let Some(items) = &report.menu_items {
                self.menu.set_menu_items(items.clone());
            }
            if let Some(members) = &report.members {
                self.members.set_members(members.clone());
            }

            let drift = self.coordinator.check_consistency();
            if !drift.is_clean() {
                tracing::warn!(issues = drift.issues.len(), "Pulled data is not consistent");
            }
        }
        result
    }

    /// Force pending local snapshots to disk
    pub async fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }
}
