//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 简单健康检查 |
//! | /health/detailed | GET | 含连接状态、队列长度的详细检查 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::AppState;
use crate::offline::ConnectivityStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

/// 简单健康检查响应
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// 详细健康检查响应
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    orders: usize,
    tables: usize,
    /// 离线队列中待重放的条目数
    queued_changes: usize,
    connectivity: ConnectivityStatus,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/detailed
async fn detailed_health(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    Json(DetailedHealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        orders: state.orders.len(),
        tables: state.tables.len(),
        queued_changes: state.queue.len(),
        connectivity: state.connectivity.status(),
    })
}
