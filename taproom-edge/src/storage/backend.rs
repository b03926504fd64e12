//! Snapshot backends
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `snapshots` | collection key | JSON snapshot bytes | Latest state per collection |
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns (copy-on-write
//! with an atomic pointer swap), so a bar terminal that loses power keeps
//! the last committed snapshot of every collection.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Table for storing snapshots: key = collection key, value = JSON bytes
const SNAPSHOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot for '{0}': {1}")]
    Malformed(String, String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value persistence keyed by collection name
pub trait SnapshotBackend: Send + Sync {
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    fn save(&self, key: &str, payload: &[u8]) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Primary backend backed by redb
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend").finish_non_exhaustive()
    }
}

impl RedbBackend {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, ephemeral terminals)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SNAPSHOTS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl SnapshotBackend for RedbBackend {
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn save(&self, key: &str, payload: &[u8]) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
            table.insert(key, payload)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }
}

/// Cross-platform fallback: one `<key>.json` file per collection
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, payload: &[u8]) -> StorageResult<()> {
        // write-then-rename so a crash never leaves a half-written snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Local-first storage: primary backend with an optional slower fallback
///
/// Reads prefer the primary; the fallback is only consulted when the
/// primary holds no snapshot for the key. Writes go to the primary and are
/// mirrored to the fallback on a best-effort basis.
#[derive(Clone)]
pub struct LocalStorage {
    primary: Arc<dyn SnapshotBackend>,
    fallback: Option<Arc<dyn SnapshotBackend>>,
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl LocalStorage {
    pub fn new(
        primary: Arc<dyn SnapshotBackend>,
        fallback: Option<Arc<dyn SnapshotBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// In-memory redb without fallback
    pub fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(Arc::new(RedbBackend::open_in_memory()?), None))
    }

    pub fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if let Some(bytes) = self.primary.load(key)? {
            return Ok(Some(bytes));
        }
        match &self.fallback {
            Some(fallback) => {
                let bytes = fallback.load(key)?;
                if bytes.is_some() {
                    tracing::info!(key, "Rehydrating from fallback storage");
                }
                Ok(bytes)
            }
            None => Ok(None),
        }
    }

    pub fn save(&self, key: &str, payload: &[u8]) -> StorageResult<()> {
        self.primary.save(key, payload)?;
        if let Some(fallback) = &self.fallback
            && let Err(e) = fallback.save(key, payload)
        {
            tracing::warn!(key, error = %e, "Failed to mirror snapshot to fallback storage");
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.primary.remove(key)?;
        if let Some(fallback) = &self.fallback
            && let Err(e) = fallback.remove(key)
        {
            tracing::warn!(key, error = %e, "Failed to remove snapshot from fallback storage");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redb_save_load_remove() {
        let backend = RedbBackend::open_in_memory().unwrap();
        assert!(backend.load("orders").unwrap().is_none());

        backend.save("orders", b"{\"state\":{}}").unwrap();
        assert_eq!(
            backend.load("orders").unwrap().as_deref(),
            Some(&b"{\"state\":{}}"[..])
        );

        backend.remove("orders").unwrap();
        assert!(backend.load("orders").unwrap().is_none());
    }

    #[test]
    fn test_redb_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taproom.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.save("tables", b"[1]").unwrap();
        }
        let backend = RedbBackend::open(&path).unwrap();
        assert_eq!(backend.load("tables").unwrap().as_deref(), Some(&b"[1]"[..]));
    }

    #[test]
    fn test_file_backend_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        assert!(backend.load("orders").unwrap().is_none());
        backend.remove("orders").unwrap();
    }

    #[test]
    fn test_primary_takes_precedence_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = Arc::new(FileBackend::new(dir.path()).unwrap());
        fallback.save("orders", b"fallback").unwrap();

        let primary = Arc::new(RedbBackend::open_in_memory().unwrap());
        let storage = LocalStorage::new(primary.clone(), Some(fallback.clone()));

        // Primary empty → fallback consulted
        assert_eq!(storage.load("orders").unwrap().as_deref(), Some(&b"fallback"[..]));

        primary.save("orders", b"primary").unwrap();
        assert_eq!(storage.load("orders").unwrap().as_deref(), Some(&b"primary"[..]));
    }

    #[test]
    fn test_save_mirrors_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = Arc::new(FileBackend::new(dir.path()).unwrap());
        let storage = LocalStorage::new(
            Arc::new(RedbBackend::open_in_memory().unwrap()),
            Some(fallback.clone()),
        );

        storage.save("members", b"m").unwrap();
        assert_eq!(fallback.load("members").unwrap().as_deref(), Some(&b"m"[..]));
    }
}
