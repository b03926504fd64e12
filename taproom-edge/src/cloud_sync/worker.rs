//! CloudSyncWorker - pushes committed local changes to the remote
//!
//! Subscribes to the [`ChangeBus`](crate::message::ChangeBus), debounces
//! changes per record and pushes the latest state of each. A change goes
//! to the offline queue instead when the remote is unreachable, when the
//! push fails, or when older changes are still queued (so it cannot
//! overtake them).

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::remote::RemoteError;
use super::schema;
use crate::core::AppState;
use crate::message::{ChangeAction, Collection, StoreChange};

/// Idle wake-up when nothing is pending
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

type PendingChanges = HashMap<(Collection, String), ChangeAction>;

pub struct CloudSyncWorker {
    state: AppState,
    debounce: Duration,
    rx: broadcast::Receiver<StoreChange>,
}

impl CloudSyncWorker {
    /// Subscribes immediately; changes made before `run` are not lost
    pub fn new(state: AppState, debounce: Duration) -> Self {
        let rx = state.bus.subscribe();
        Self {
            state,
            debounce,
            rx,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(debounce_ms = self.debounce.as_millis() as u64, "CloudSyncWorker started");

        let mut pending = PendingChanges::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let sleep_until = deadline.unwrap_or_else(|| Instant::now() + IDLE_SLEEP);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("CloudSyncWorker shutting down");
                    while let Ok(StoreChange { collection, id, action }) = self.rx.try_recv() {
                        pending.insert((collection, id), action);
                    }
                    self.flush_pending(&mut pending).await;
                    break;
                }

                _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() => {
                    self.flush_pending(&mut pending).await;
                    deadline = None;
                }

                result = self.rx.recv() => {
                    match result {
                        Ok(StoreChange { collection, id, action }) => {
                            pending.insert((collection, id), action);
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "CloudSyncWorker lagged, pushing full snapshot");
                            pending.clear();
                            deadline = None;
                            if self.state.connectivity.is_online() {
                                self.state.push_all().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Change bus closed, CloudSyncWorker stopping");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("CloudSyncWorker stopped");
    }

    async fn flush_pending(&self, pending: &mut PendingChanges) {
        if pending.is_empty() {
            return;
        }
        if !self.state.settings.get().auto_sync {
            tracing::debug!(count = pending.len(), "Auto sync disabled, changes not pushed");
            pending.clear();
            return;
        }

        let count = pending.len();
        let mut queued = 0;
        for ((collection, id), action) in pending.drain() {
            let (action, payload) = match action {
                ChangeAction::Upsert => match self.current_row(collection, &id) {
                    Some(row) => (ChangeAction::Upsert, row),
                    // deleted again within the window
                    None => (ChangeAction::Delete, Value::Null),
                },
                ChangeAction::Delete => (ChangeAction::Delete, Value::Null),
            };

            let direct = self.state.connectivity.is_online() && self.state.queue.is_empty();
            if direct {
                match self.push_one(collection, &id, action, payload.clone()).await {
                    Ok(()) => continue,
                    Err(e) => {
                        tracing::warn!(collection = %collection, id = %id, error = %e, "Push failed, queueing");
                        if matches!(e, RemoteError::Transport(_)) {
                            self.state.connectivity.report_failure(e.to_string());
                        }
                    }
                }
            }
            self.state.queue.enqueue(collection, action, id, payload);
            queued += 1;
        }

        tracing::debug!(count, queued, "Flushed pending changes");
    }

    async fn push_one(
        &self,
        collection: Collection,
        id: &str,
        action: ChangeAction,
        payload: Value,
    ) -> Result<(), RemoteError> {
        match action {
            ChangeAction::Upsert => self.state.sync.remote().upsert(collection, payload).await,
            ChangeAction::Delete => self.state.sync.delete_record(collection, id).await,
        }
    }

    /// Remote row for the current local state of a record
    fn current_row(&self, collection: Collection, id: &str) -> Option<Value> {
        let encoded = match collection {
            Collection::Orders => schema::encode(&self.state.orders.get(id)?),
            Collection::Tables => schema::encode(&self.state.tables.get(id.parse().ok()?)?),
            Collection::MenuItems => schema::encode(&self.state.menu.get(id)?),
            Collection::Members => schema::encode(&self.state.members.get(id)?),
        };
        encoded
            .inspect_err(|e| tracing::error!(collection = %collection, id, error = %e, "Failed to encode row"))
            .ok()
    }
}
