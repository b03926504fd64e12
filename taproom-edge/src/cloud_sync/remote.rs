//! Remote table store abstraction

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::message::Collection;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Remote request failed: {0}")]
    Transport(String),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid remote payload: {0}")]
    Decode(String),

    #[error("Remote rejected write: {0}")]
    Rejected(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Row-oriented remote database
///
/// Rows are snake_case JSON objects carrying an `id` column. Writes are
/// upserts keyed by `id`; the last write wins.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Cheap reachability check
    async fn probe(&self) -> RemoteResult<()>;

    async fn select_all(&self, collection: Collection) -> RemoteResult<Vec<Value>>;

    async fn upsert(&self, collection: Collection, row: Value) -> RemoteResult<()>;

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()>;
}
