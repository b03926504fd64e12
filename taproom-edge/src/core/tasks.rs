//! 后台任务管理
//!
//! 统一管理所有后台任务的注册、启动和关闭。
//!
//! # 任务类型
//!
//! - [`TaskKind::Worker`] - 长期后台工作者 (persist, cloud sync, offline replay)
//! - [`TaskKind::Periodic`] - 定时任务 (connectivity probe, consistency sweep)

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::AppState;
use crate::cloud_sync::CloudSyncWorker;
use crate::offline::OfflineWorker;
use crate::storage::PersistWorker;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Worker,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    /// 全局取消令牌
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    ///
    /// 任务会被包装以捕获 panic，异常退出会记录错误日志。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let wrapped_future = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if !shutdown.is_cancelled() => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Ok(()) => {}
                Err(panic_info) => {
                    let panic_msg = panic_info
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic_info.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "Unknown panic".to_string());
                    tracing::error!(task = %name, kind = %kind, panic = %panic_msg, "Background task panicked");
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Graceful shutdown - 取消所有任务并等待完成
    pub async fn shutdown(self) {
        tracing::info!(count = self.tasks.len(), "Shutting down background tasks");
        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// Register every background task for `state`
pub(super) fn start(state: &AppState, persist_worker: Option<PersistWorker>) -> BackgroundTasks {
    let mut tasks = BackgroundTasks::new();
    let config = &state.config;

    if let Some(worker) = persist_worker {
        tasks.spawn("persist_worker", TaskKind::Worker, worker.run(tasks.shutdown_token()));
    }

    tasks.spawn(
        "connectivity_monitor",
        TaskKind::Periodic,
        state.connectivity.clone().run(tasks.shutdown_token()),
    );

    let cloud_sync = CloudSyncWorker::new(state.clone(), config.sync_debounce());
    tasks.spawn("cloud_sync", TaskKind::Worker, cloud_sync.run(tasks.shutdown_token()));

    let offline = OfflineWorker::new(
        state.queue.clone(),
        state.sync.clone(),
        state.connectivity.subscribe(),
        config.connectivity_interval(),
    );
    tasks.spawn("offline_replay", TaskKind::Worker, offline.run(tasks.shutdown_token()));

    if let Some(interval) = config.consistency_interval() {
        let coordinator = state.coordinator.clone();
        let repair = config.consistency_repair;
        let shutdown = tasks.shutdown_token();
        tasks.spawn("consistency_sweep", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if repair {
                            coordinator.repair_consistency();
                        } else {
                            coordinator.check_consistency();
                        }
                    }
                }
            }
        });
    }

    tracing::info!(count = tasks.len(), "Background tasks registered");
    tasks
}
