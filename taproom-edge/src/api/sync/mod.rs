//! Cloud Sync API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/sync/status | GET | 连接状态与离线队列 |
//! | /api/sync/test | POST | 立即探测远端 |
//! | /api/sync/push | POST | 推送全部本地数据 |
//! | /api/sync/pull | POST | 拉取远端数据并覆盖本地 |
//! | /api/sync/replay | POST | 立即重放离线队列 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handler::status))
        .route("/test", post(handler::test_connection))
        .route("/push", post(handler::push))
        .route("/pull", post(handler::pull))
        .route("/replay", post(handler::replay))
}
