//! Connectivity Monitor - 远端连通性监控
//!
//! Probes the remote through [`SyncService::test_connection`] on a fixed
//! interval and publishes a [`ConnectivityStatus`] snapshot on a `watch`
//! channel. Subscribers see only the latest state.

use serde::Serialize;
use shared::util::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cloud_sync::SyncService;

/// Latency thresholds (ms) for [`LinkQuality`]
const GOOD_LATENCY_MS: u64 = 300;
const DEGRADED_LATENCY_MS: u64 = 1000;

/// Coarse link quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkQuality {
    Good,
    Degraded,
    Poor,
    Offline,
}

impl LinkQuality {
    /// Quality of a successful probe; retries count against it
    pub fn from_probe(latency_ms: u64, attempts: u32) -> Self {
        match (latency_ms, attempts) {
            (ms, 1) if ms < GOOD_LATENCY_MS => LinkQuality::Good,
            (ms, _) if ms < DEGRADED_LATENCY_MS => LinkQuality::Degraded,
            _ => LinkQuality::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityStatus {
    pub online: bool,
    pub quality: LinkQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_online_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<i64>,
    /// Failed checks since the last successful one
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        Self {
            online: false,
            quality: LinkQuality::Offline,
            latency_ms: None,
            last_online_at: None,
            last_checked_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// 连通性监控器
pub struct ConnectivityMonitor {
    sync: Arc<SyncService>,
    clock: Arc<dyn Clock>,
    tx: watch::Sender<ConnectivityStatus>,
    check_interval: Duration,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &*self.tx.borrow())
            .field("check_interval", &self.check_interval)
            .finish()
    }
}

impl ConnectivityMonitor {
    pub fn new(sync: Arc<SyncService>, clock: Arc<dyn Clock>, check_interval: Duration) -> Self {
        let (tx, _) = watch::channel(ConnectivityStatus::default());
        Self {
            sync,
            clock,
            tx,
            check_interval,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.tx.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    /// Probe now and publish the result
    pub async fn check(&self) -> ConnectivityStatus {
        let result = self.sync.test_connection().await;
        let now = self.clock.now_millis();
        let previous = self.status();

        let next = match result.data {
            Some(probe) if result.success => ConnectivityStatus {
                online: true,
                quality: LinkQuality::from_probe(probe.latency_ms, probe.attempts),
                latency_ms: Some(probe.latency_ms),
                last_online_at: Some(now),
                last_checked_at: Some(now),
                consecutive_failures: 0,
                last_error: None,
            },
            _ => ConnectivityStatus {
                online: false,
                quality: LinkQuality::Offline,
                latency_ms: None,
                last_online_at: previous.last_online_at,
                last_checked_at: Some(now),
                consecutive_failures: previous.consecutive_failures + 1,
                last_error: result.error,
            },
        };

        self.publish(&previous, next.clone());
        next
    }

    /// Record a failed remote call observed outside the probe loop
    pub fn report_failure(&self, error: impl Into<String>) {
        let previous = self.status();
        if !previous.online {
            return;
        }
        let next = ConnectivityStatus {
            online: false,
            quality: LinkQuality::Offline,
            latency_ms: None,
            last_checked_at: Some(self.clock.now_millis()),
            consecutive_failures: 1,
            last_error: Some(error.into()),
            ..previous.clone()
        };
        self.publish(&previous, next);
    }

    fn publish(&self, previous: &ConnectivityStatus, next: ConnectivityStatus) {
        match (previous.online, next.online) {
            (false, true) => tracing::info!(
                quality = ?next.quality,
                latency_ms = next.latency_ms,
                "Remote is reachable"
            ),
            (true, false) => tracing::warn!(
                error = next.last_error.as_deref().unwrap_or_default(),
                "Remote connection lost"
            ),
            _ => {}
        }
        self.tx.send_replace(next);
    }

    /// Periodic probing until `shutdown`
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.check_interval.as_secs(),
            "ConnectivityMonitor started"
        );
        let mut ticker = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }

        tracing::info!("ConnectivityMonitor stopped");
    }
}
