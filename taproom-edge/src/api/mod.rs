//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 订单接口（创建/加单/结账等联动操作走 coordinator）
//! - [`tables`] - 桌台管理接口
//! - [`menu`] - 酒单接口
//! - [`members`] - 会员接口
//! - [`settings`] - 店铺设置
//! - [`sync`] - 远端同步、连接状态与离线队列
//! - [`consistency`] - 订单/桌台一致性检查
//! - [`data_transfer`] - 备份导入导出

pub mod consistency;
pub mod data_transfer;
pub mod health;
pub mod members;
pub mod menu;
pub mod orders;
pub mod settings;
pub mod sync;
pub mod tables;

use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::AppState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// In-flight request cap; the edge node serves a handful of terminals
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(tables::router())
        .merge(menu::router())
        .merge(members::router())
        .merge(settings::router())
        .merge(sync::router())
        .merge(consistency::router())
        .merge(data_transfer::router())
}

/// Build a fully configured application with middleware and state
pub fn build_app(state: AppState) -> Router {
    build_router()
        // CORS - the UI runs in a webview on another origin
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
