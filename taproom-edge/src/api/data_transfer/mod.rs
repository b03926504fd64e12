//! Data Transfer API - 本地数据备份与恢复
//!
//! - GET /api/data-transfer/export → `{ state: { ... } }`
//! - POST /api/data-transfer/import → 校验后整体替换
//! - POST /api/data-transfer/clear → 清空订单、释放桌台

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/data-transfer/export", get(handler::export))
        .route("/api/data-transfer/import", post(handler::import))
        .route("/api/data-transfer/clear", post(handler::clear))
}
