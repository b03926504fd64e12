//! Cloud Sync API Handlers
//!
//! Sync failures are reported in the [`SyncResult`] body with HTTP 200;
//! only local errors become error responses.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::cloud_sync::{PullReport, PushReport, SyncResult};
use crate::core::AppState;
use crate::offline::{ConnectivityStatus, QueueEntry, ReplayReport};
use crate::utils::AppResult;

/// 同步状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub connectivity: ConnectivityStatus,
    pub auto_sync: bool,
    pub queue_length: usize,
    pub queue: Vec<QueueEntry>,
}

/// GET /api/sync/status
pub async fn status(State(state): State<AppState>) -> AppResult<Json<SyncStatusResponse>> {
    let queue = state.queue.entries();
    Ok(Json(SyncStatusResponse {
        connectivity: state.connectivity.status(),
        auto_sync: state.settings.get().auto_sync,
        queue_length: queue.len(),
        queue,
    }))
}

/// POST /api/sync/test - 探测远端并更新连接状态
pub async fn test_connection(
    State(state): State<AppState>,
) -> AppResult<Json<SyncResult<ConnectivityStatus>>> {
    let status = state.connectivity.check().await;
    let result = if status.online {
        SyncResult::ok(status)
    } else {
        let error = status
            .last_error
            .clone()
            .unwrap_or_else(|| "Remote unreachable".into());
        SyncResult::partial(status, error)
    };
    Ok(Json(result))
}

/// POST /api/sync/push
pub async fn push(State(state): State<AppState>) -> AppResult<Json<SyncResult<PushReport>>> {
    Ok(Json(state.push_all().await))
}

/// POST /api/sync/pull
pub async fn pull(State(state): State<AppState>) -> AppResult<Json<SyncResult<PullReport>>> {
    Ok(Json(state.pull_and_apply().await))
}

/// POST /api/sync/replay
pub async fn replay(State(state): State<AppState>) -> AppResult<Json<ReplayReport>> {
    let report = state.queue.replay(state.sync.as_ref()).await;
    Ok(Json(report))
}
