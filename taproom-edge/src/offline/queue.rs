//! Durable ordered queue of mutations awaiting remote delivery
//!
//! Mirrors the archive worker's pending-queue pattern: every entry carries a
//! retry counter, each state change is written through immediately, and an
//! entry that keeps failing is dead-lettered (dropped with a warning and
//! surfaced in the [`ReplayReport`]).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::util::Clock;
use std::sync::Arc;

use crate::message::{ChangeAction, Collection};
use crate::storage::{self, ImmediatePersist, LocalStorage, StorageResult, keys};
use crate::utils::AppResult;

/// Default attempts before an entry is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub collection: Collection,
    pub action: ChangeAction,
    /// Key of the affected record
    pub record_id: String,
    /// Remote row for upserts, `null` for deletes
    pub payload: Value,
    pub created_at: i64,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Executes queue entries; the queue treats them as opaque
#[async_trait]
pub trait QueueExecutor: Send + Sync {
    async fn execute(&self, entry: &QueueEntry) -> AppResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub succeeded: usize,
    /// Failed this round, still queued
    pub retained: usize,
    /// Failed for the last time and removed
    pub dropped: Vec<QueueEntry>,
    pub remaining: usize,
    /// Another replay was already running
    pub skipped: bool,
}

pub struct OfflineQueue {
    entries: Mutex<Vec<QueueEntry>>,
    persist: ImmediatePersist,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    replay_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("entries", &self.entries.lock().len())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl OfflineQueue {
    /// Reload queued entries from local storage
    pub fn load(storage: &LocalStorage, clock: Arc<dyn Clock>, max_retries: u32) -> StorageResult<Self> {
        let entries: Vec<QueueEntry> = storage::load_collection(storage, keys::OFFLINE_QUEUE)?;
        if !entries.is_empty() {
            tracing::info!(count = entries.len(), "Offline queue reloaded");
        }
        Ok(Self {
            entries: Mutex::new(entries),
            persist: ImmediatePersist::new(storage.clone()),
            clock,
            max_retries: max_retries.max(1),
            replay_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Append a mutation; persisted before returning
    pub fn enqueue(
        &self,
        collection: Collection,
        action: ChangeAction,
        record_id: impl Into<String>,
        payload: Value,
    ) -> QueueEntry {
        let entry = QueueEntry {
            id: uuid::Uuid::new_v4().to_string(),
            collection,
            action,
            record_id: record_id.into(),
            payload,
            created_at: self.clock.now_millis(),
            retry_count: 0,
            last_error: None,
        };

        let mut entries = self.entries.lock();
        entries.push(entry.clone());
        self.save(&entries);
        tracing::info!(
            collection = %collection,
            action = action.as_str(),
            record_id = %entry.record_id,
            queued = entries.len(),
            "Mutation queued for remote delivery"
        );
        entry
    }

    /// Replay entries in order until the first failure
    ///
    /// Stopping at a failure keeps later mutations of the same record from
    /// overtaking earlier ones. Only one replay runs at a time; a concurrent
    /// call returns immediately with `skipped`.
    pub async fn replay(&self, executor: &dyn QueueExecutor) -> ReplayReport {
        let Ok(_guard) = self.replay_lock.try_lock() else {
            tracing::debug!("Replay already in progress");
            return ReplayReport {
                skipped: true,
                remaining: self.len(),
                ..Default::default()
            };
        };

        let mut report = ReplayReport::default();
        loop {
            let next = self.entries.lock().first().cloned();
            let Some(entry) = next else {
                break;
            };

            match executor.execute(&entry).await {
                Ok(()) => {
                    self.remove(&entry.id);
                    report.succeeded += 1;
                }
                Err(e) => {
                    let attempts = entry.retry_count + 1;
                    if attempts >= self.max_retries {
                        tracing::warn!(
                            entry_id = %entry.id,
                            collection = %entry.collection,
                            record_id = %entry.record_id,
                            attempts,
                            error = %e,
                            "Dropping queued mutation after repeated failures"
                        );
                        self.remove(&entry.id);
                        report.dropped.push(QueueEntry {
                            retry_count: attempts,
                            last_error: Some(e.to_string()),
                            ..entry
                        });
                        // the next entry gets its own chance this round
                        continue;
                    }

                    tracing::debug!(entry_id = %entry.id, attempts, error = %e, "Queued mutation failed");
                    self.mark_failed(&entry.id, attempts, e.to_string());
                    report.retained += 1;
                    break;
                }
            }
        }

        report.remaining = self.len();
        if report.succeeded > 0 || !report.dropped.is_empty() {
            tracing::info!(
                succeeded = report.succeeded,
                dropped = report.dropped.len(),
                remaining = report.remaining,
                "Offline queue replayed"
            );
        }
        report
    }

    fn remove(&self, entry_id: &str) {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.id != entry_id);
        self.save(&entries);
    }

    fn mark_failed(&self, entry_id: &str, retry_count: u32, error: String) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.retry_count = retry_count;
            entry.last_error = Some(error);
        }
        self.save(&entries);
    }

    fn save(&self, entries: &[QueueEntry]) {
        storage::persist_collection(&self.persist, keys::OFFLINE_QUEUE, entries);
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.save(&entries);
    }
}
