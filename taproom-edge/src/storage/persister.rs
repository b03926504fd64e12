//! Write-coalescing persistence
//!
//! Stores hand every encoded snapshot to a [`Persist`] sink. The coalescing
//! sink keeps only the latest payload per key and writes once no mutation
//! arrived for `window`; a steady stream of mutations is still flushed at
//! least every `window * MAX_WAIT_FACTOR`.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::LocalStorage;

/// Upper bound on coalescing, as a multiple of the window
const MAX_WAIT_FACTOR: u32 = 5;

/// Sink for encoded collection snapshots
pub trait Persist: Send + Sync {
    fn persist(&self, key: &'static str, payload: Vec<u8>);
}

/// Writes through synchronously
#[derive(Debug, Clone)]
pub struct ImmediatePersist {
    storage: LocalStorage,
}

impl ImmediatePersist {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }
}

impl Persist for ImmediatePersist {
    fn persist(&self, key: &'static str, payload: Vec<u8>) {
        if let Err(e) = self.storage.save(key, &payload) {
            tracing::error!(key, error = %e, "Failed to persist snapshot");
        }
    }
}

enum PersistCommand {
    Write {
        key: &'static str,
        payload: Vec<u8>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to a running [`PersistWorker`]
#[derive(Debug, Clone)]
pub struct CoalescingPersist {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl std::fmt::Debug for PersistCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistCommand::Write { key, payload } => f
                .debug_struct("Write")
                .field("key", key)
                .field("bytes", &payload.len())
                .finish(),
            PersistCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl CoalescingPersist {
    /// Create the sink and the worker that drains it
    pub fn new(storage: LocalStorage, window: Duration) -> (Self, PersistWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            PersistWorker {
                storage,
                window,
                rx,
            },
        )
    }

    /// Force pending snapshots to disk; resolves once they are written
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(ack_tx)).is_err() {
            tracing::warn!("Persist worker stopped, nothing to flush");
            return;
        }
        let _ = ack_rx.await;
    }
}

impl Persist for CoalescingPersist {
    fn persist(&self, key: &'static str, payload: Vec<u8>) {
        if self
            .tx
            .send(PersistCommand::Write { key, payload })
            .is_err()
        {
            tracing::error!(key, "Persist worker stopped, snapshot dropped");
        }
    }
}

/// Background writer for [`CoalescingPersist`]
pub struct PersistWorker {
    storage: LocalStorage,
    window: Duration,
    rx: mpsc::UnboundedReceiver<PersistCommand>,
}

impl PersistWorker {
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(window_ms = self.window.as_millis() as u64, "PersistWorker started");

        let max_wait = self.window * MAX_WAIT_FACTOR;
        let mut pending: HashMap<&'static str, Vec<u8>> = HashMap::new();
        let mut first_write: Option<Instant> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let sleep_until = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = shutdown.cancelled() => {
                    while let Ok(cmd) = self.rx.try_recv() {
                        self.absorb(cmd, &mut pending);
                    }
                    self.flush_pending(&mut pending);
                    break;
                }

                _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() => {
                    self.flush_pending(&mut pending);
                    deadline = None;
                    first_write = None;
                }

                cmd = self.rx.recv() => {
                    match cmd {
                        Some(PersistCommand::Write { key, payload }) => {
                            pending.insert(key, payload);
                            let now = Instant::now();
                            let first = *first_write.get_or_insert(now);
                            deadline = Some((now + self.window).min(first + max_wait));
                        }
                        Some(PersistCommand::Flush(ack)) => {
                            self.flush_pending(&mut pending);
                            deadline = None;
                            first_write = None;
                            let _ = ack.send(());
                        }
                        None => {
                            self.flush_pending(&mut pending);
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("PersistWorker stopped");
    }

    fn absorb(&self, cmd: PersistCommand, pending: &mut HashMap<&'static str, Vec<u8>>) {
        match cmd {
            PersistCommand::Write { key, payload } => {
                pending.insert(key, payload);
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn flush_pending(&self, pending: &mut HashMap<&'static str, Vec<u8>>) {
        if pending.is_empty() {
            return;
        }
        let count = pending.len();
        for (key, payload) in pending.drain() {
            if let Err(e) = self.storage.save(key, &payload) {
                tracing::error!(key, error = %e, "Failed to flush snapshot");
            }
        }
        tracing::debug!(count, "Flushed coalesced snapshots");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_coalesce_to_latest_payload() {
        let storage = LocalStorage::in_memory().unwrap();
        let (sink, worker) = CoalescingPersist::new(storage.clone(), Duration::from_millis(20));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        sink.persist("orders", b"v1".to_vec());
        sink.persist("orders", b"v2".to_vec());
        sink.persist("orders", b"v3".to_vec());

        // Nothing written inside the window
        assert!(storage.load("orders").unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(storage.load("orders").unwrap().as_deref(), Some(&b"v3"[..]));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_steady_writes_still_flush_after_max_wait() {
        let storage = LocalStorage::in_memory().unwrap();
        let window = Duration::from_millis(40);
        let (sink, worker) = CoalescingPersist::new(storage.clone(), window);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        // Each write lands well inside the window, so only the cap can flush
        let started = Instant::now();
        let mut flushed_while_writing = false;
        for i in 0..100u32 {
            sink.persist("orders", i.to_string().into_bytes());
            tokio::time::sleep(Duration::from_millis(10)).await;
            if storage.load("orders").unwrap().is_some() {
                flushed_while_writing = true;
                break;
            }
        }
        assert!(flushed_while_writing);
        assert!(started.elapsed() < window * MAX_WAIT_FACTOR * 3);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let storage = LocalStorage::in_memory().unwrap();
        let (sink, worker) = CoalescingPersist::new(storage.clone(), Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        sink.persist("tables", b"t".to_vec());
        sink.flush().await;
        assert_eq!(storage.load("tables").unwrap().as_deref(), Some(&b"t"[..]));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let storage = LocalStorage::in_memory().unwrap();
        let (sink, worker) = CoalescingPersist::new(storage.clone(), Duration::from_secs(60));
        let shutdown = CancellationToken::new();

        sink.persist("members", b"m".to_vec());
        shutdown.cancel();
        worker.run(shutdown).await;

        assert_eq!(storage.load("members").unwrap().as_deref(), Some(&b"m"[..]));
    }

    #[test]
    fn test_immediate_persist_writes_through() {
        let storage = LocalStorage::in_memory().unwrap();
        let sink = ImmediatePersist::new(storage.clone());
        sink.persist("orders", b"x".to_vec());
        assert_eq!(storage.load("orders").unwrap().as_deref(), Some(&b"x"[..]));
    }
}
