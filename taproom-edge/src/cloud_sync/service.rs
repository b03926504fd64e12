//! SyncService - push/pull local collections against a [`RemoteStore`]

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use shared::models::{DiningTable, Member, MenuItem, Order};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use super::schema::{self, RemoteRecord};
use crate::message::{ChangeAction, Collection};
use crate::offline::{QueueEntry, QueueExecutor};
use crate::utils::{AppError, AppResult};

/// Structured outcome of a sync operation; never a panic or a hang
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> SyncResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Failed, but with partial data attached
    pub fn partial(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub attempts: u32,
    pub latency_ms: u64,
}

/// Per-collection push counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionPush {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub orders: CollectionPush,
    pub tables: CollectionPush,
    pub menu_items: CollectionPush,
    pub members: CollectionPush,
}

impl PushReport {
    pub fn failed(&self) -> usize {
        self.orders.failed + self.tables.failed + self.menu_items.failed + self.members.failed
    }

    pub fn succeeded(&self) -> usize {
        self.orders.success + self.tables.success + self.menu_items.success + self.members.success
    }
}

/// Records to push, or pulled records to apply
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub orders: Vec<Order>,
    pub tables: Vec<DiningTable>,
    pub menu_items: Vec<MenuItem>,
    pub members: Vec<Member>,
}

/// Pulled collections; `None` where the fetch failed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub orders: Option<Vec<Order>>,
    pub tables: Option<Vec<DiningTable>>,
    pub menu_items: Option<Vec<MenuItem>>,
    pub members: Option<Vec<Member>>,
    pub errors: Vec<String>,
}

pub struct SyncService {
    remote: Arc<dyn RemoteStore>,
    probe_attempts: u32,
    probe_backoff: Duration,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("remote", &self.remote.name())
            .field("probe_attempts", &self.probe_attempts)
            .finish()
    }
}

impl SyncService {
    pub fn new(remote: Arc<dyn RemoteStore>, probe_attempts: u32, probe_backoff: Duration) -> Self {
        Self {
            remote,
            probe_attempts: probe_attempts.max(1),
            probe_backoff,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Probe the remote with bounded retry
    pub async fn test_connection(&self) -> SyncResult<ProbeOutcome> {
        let mut last_error = None;

        for attempt in 1..=self.probe_attempts {
            let started = Instant::now();
            match self.remote.probe().await {
                Ok(()) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    tracing::debug!(attempt, latency_ms, remote = self.remote.name(), "Remote reachable");
                    return SyncResult::ok(ProbeOutcome {
                        attempts: attempt,
                        latency_ms,
                    });
                }
                Err(e) => {
                    tracing::debug!(attempt, max_attempts = self.probe_attempts, error = %e, "Remote probe failed");
                    last_error = Some(e);
                    if attempt < self.probe_attempts {
                        tokio::time::sleep(self.probe_backoff).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::warn!(attempts = self.probe_attempts, error = %reason, "Remote unreachable");
        SyncResult::failure(format!(
            "Remote unreachable after {} attempts: {reason}",
            self.probe_attempts
        ))
    }

    /// Upsert every record of every collection, all-settled
    pub async fn push(&self, snapshot: &SyncSnapshot) -> SyncResult<PushReport> {
        let report = PushReport {
            orders: self.push_collection(&snapshot.orders).await,
            tables: self.push_collection(&snapshot.tables).await,
            menu_items: self.push_collection(&snapshot.menu_items).await,
            members: self.push_collection(&snapshot.members).await,
        };

        let failed = report.failed();
        tracing::info!(succeeded = report.succeeded(), failed, "Push finished");
        if failed == 0 {
            SyncResult::ok(report)
        } else {
            SyncResult::partial(report, format!("{failed} record(s) failed to push"))
        }
    }

    async fn push_collection<T: RemoteRecord + Sync>(&self, records: &[T]) -> CollectionPush {
        let outcomes = join_all(records.iter().map(|record| self.upsert_record(record))).await;

        let mut push = CollectionPush::default();
        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                Ok(()) => push.success += 1,
                Err(e) => {
                    tracing::warn!(collection = %T::COLLECTION, id = %record.key(), error = %e, "Upsert failed");
                    push.failed += 1;
                    push.errors.push(format!("{} {}: {e}", T::COLLECTION, record.key()));
                }
            }
        }
        push
    }

    /// Fetch every collection; stores are not touched
    pub async fn pull(&self) -> SyncResult<PullReport> {
        let mut report = PullReport::default();
        report.orders = self.pull_collection(&mut report.errors).await;
        report.tables = self.pull_collection(&mut report.errors).await;
        report.menu_items = self.pull_collection(&mut report.errors).await;
        report.members = self.pull_collection(&mut report.errors).await;

        if report.errors.is_empty() {
            SyncResult::ok(report)
        } else {
            let summary = report.errors.join("; ");
            SyncResult::partial(report, summary)
        }
    }

    async fn pull_collection<T: RemoteRecord>(&self, errors: &mut Vec<String>) -> Option<Vec<T>> {
        match self.remote.select_all(T::COLLECTION).await {
            Ok(rows) => {
                let fetched = rows.len();
                let records = schema::decode_rows::<T>(rows);
                tracing::debug!(collection = %T::COLLECTION, fetched, decoded = records.len(), "Pulled collection");
                Some(records)
            }
            Err(e) => {
                tracing::warn!(collection = %T::COLLECTION, error = %e, "Pull failed");
                errors.push(format!("{}: {e}", T::COLLECTION));
                None
            }
        }
    }

    pub async fn upsert_record<T: RemoteRecord>(&self, record: &T) -> RemoteResult<()> {
        let row = schema::encode(record).map_err(|e| RemoteError::Decode(e.to_string()))?;
        self.remote.upsert(T::COLLECTION, row).await
    }

    pub async fn delete_record(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.remote.delete(collection, id).await
    }
}

#[async_trait]
impl QueueExecutor for SyncService {
    async fn execute(&self, entry: &QueueEntry) -> AppResult<()> {
        let outcome = match entry.action {
            ChangeAction::Upsert => self.remote.upsert(entry.collection, entry.payload.clone()).await,
            ChangeAction::Delete => self.remote.delete(entry.collection, &entry.record_id).await,
        };
        outcome.map_err(|e| AppError::Remote(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_sync::MemoryRemote;
    use shared::models::{OrderItem, OrderStatus};

    fn order(id: &str) -> Order {
        Order {
            id: id.into(),
            table_number: 1,
            customers: 1,
            items: vec![OrderItem {
                id: "a".into(),
                name: "a".into(),
                price: 3.0,
                quantity: 2,
            }],
            subtotal: 6.0,
            total: 6.0,
            status: OrderStatus::Pending,
            notes: String::new(),
            created_at: 1,
            updated_at: 1,
            completed_at: None,
        }
    }

    fn service(remote: Arc<MemoryRemote>) -> SyncService {
        SyncService::new(remote, 3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_push_is_all_settled() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_writes_for("bad");
        let sync = service(remote.clone());

        let result = sync
            .push(&SyncSnapshot {
                orders: vec![order("bad"), order("good")],
                ..Default::default()
            })
            .await;

        assert!(!result.success);
        let report = result.data.unwrap();
        assert_eq!(report.orders.success, 1);
        assert_eq!(report.orders.failed, 1);
        assert_eq!(report.orders.errors.len(), 1);
        assert!(remote.row(Collection::Orders, "good").is_some());
    }

    #[tokio::test]
    async fn test_pull_round_trips_pushed_records() {
        let remote = Arc::new(MemoryRemote::new());
        let sync = service(remote);
        sync.push(&SyncSnapshot {
            orders: vec![order("o-1")],
            ..Default::default()
        })
        .await;

        let result = sync.pull().await;
        assert!(result.success);
        let report = result.data.unwrap();
        assert_eq!(report.orders, Some(vec![order("o-1")]));
        assert_eq!(report.tables, Some(vec![]));
    }

    #[tokio::test]
    async fn test_pull_offline_reports_every_collection() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_online(false);
        let result = service(remote).pull().await;
        assert!(!result.success);
        let report = result.data.unwrap();
        assert_eq!(report.errors.len(), 4);
        assert!(report.orders.is_none());
    }

    #[tokio::test]
    async fn test_connection_gives_up_after_bounded_attempts() {
        let remote = Arc::new(MemoryRemote::new());
        let sync = service(remote.clone());
        let ok = sync.test_connection().await;
        assert!(ok.success);
        assert_eq!(ok.data.unwrap().attempts, 1);

        remote.set_online(false);
        let failed = sync.test_connection().await;
        assert!(!failed.success);
        assert!(failed.error.unwrap().contains("after 3 attempts"));
    }
}
