//! OfflineWorker - replays the offline queue when the remote comes back

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{ConnectivityStatus, OfflineQueue, QueueExecutor, ReplayReport};

pub struct OfflineWorker {
    queue: Arc<OfflineQueue>,
    executor: Arc<dyn QueueExecutor>,
    status_rx: watch::Receiver<ConnectivityStatus>,
    scan_interval: Duration,
}

impl OfflineWorker {
    pub fn new(
        queue: Arc<OfflineQueue>,
        executor: Arc<dyn QueueExecutor>,
        status_rx: watch::Receiver<ConnectivityStatus>,
        scan_interval: Duration,
    ) -> Self {
        Self {
            queue,
            executor,
            status_rx,
            scan_interval,
        }
    }

    /// Replay on start, on every offline → online edge and periodically
    /// while online
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(pending = self.queue.len(), "OfflineWorker started");

        let mut was_online = self.status_rx.borrow_and_update().online;
        let mut scan = tokio::time::interval(self.scan_interval);
        scan.tick().await; // skip immediate tick

        if was_online && !self.queue.is_empty() {
            self.replay().await;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = self.status_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("Connectivity channel closed, OfflineWorker stopping");
                        break;
                    }
                    let online = self.status_rx.borrow_and_update().online;
                    if online && !was_online {
                        tracing::info!(pending = self.queue.len(), "Back online, replaying offline queue");
                        self.replay().await;
                    }
                    was_online = online;
                }

                _ = scan.tick() => {
                    if was_online && !self.queue.is_empty() {
                        self.replay().await;
                    }
                }
            }
        }

        tracing::info!(pending = self.queue.len(), "OfflineWorker stopped");
    }

    async fn replay(&self) -> ReplayReport {
        let report = self.queue.replay(self.executor.as_ref()).await;
        for entry in &report.dropped {
            tracing::warn!(
                collection = %entry.collection,
                record_id = %entry.record_id,
                error = entry.last_error.as_deref().unwrap_or_default(),
                "Mutation permanently failed to reach the remote"
            );
        }
        report
    }
}
