//! In-process remote for standalone mode and tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::message::Collection;

/// Row key as stored: string ids verbatim, numeric ids stringified
fn row_key(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug)]
pub struct MemoryRemote {
    rows: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    online: AtomicBool,
    /// Record ids whose writes are rejected
    failing: Mutex<HashSet<String>>,
    writes: AtomicU64,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            failing: Mutex::new(HashSet::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulate losing / regaining the network
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Reject every write touching `id` until [`MemoryRemote::heal`]
    pub fn fail_writes_for(&self, id: impl Into<String>) {
        self.failing.lock().insert(id.into());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().remove(id);
    }

    /// Accepted writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn row(&self, collection: Collection, id: &str) -> Option<Value> {
        self.rows.lock().get(&collection)?.get(id).cloned()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.rows.lock().get(&collection).map_or(0, |rows| rows.len())
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Transport("network unreachable".into()))
        }
    }

    fn check_writable(&self, id: &str) -> RemoteResult<()> {
        self.check_online()?;
        if self.failing.lock().contains(id) {
            return Err(RemoteError::Rejected(format!("write for {id} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn probe(&self) -> RemoteResult<()> {
        self.check_online()
    }

    async fn select_all(&self, collection: Collection) -> RemoteResult<Vec<Value>> {
        self.check_online()?;
        Ok(self
            .rows
            .lock()
            .get(&collection)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, collection: Collection, row: Value) -> RemoteResult<()> {
        let id = row_key(&row).ok_or_else(|| RemoteError::Rejected("row has no id".into()))?;
        self.check_writable(&id)?;
        self.rows.lock().entry(collection).or_default().insert(id, row);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.check_writable(id)?;
        if let Some(rows) = self.rows.lock().get_mut(&collection) {
            rows.remove(id);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
