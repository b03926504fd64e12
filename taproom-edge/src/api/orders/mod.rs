//! Order API 模块
//!
//! 创建、删除、加单、状态流转、结账与换桌都经由 coordinator，
//! 保证订单与桌台的联动；`PUT /{id}` 只修改订单自身字段。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route(
            "/{id}",
            get(handler::get_by_id)
                .put(handler::update)
                .delete(handler::delete),
        )
        .route("/{id}/amend", post(handler::amend))
        .route("/{id}/status", post(handler::transition))
        .route("/{id}/settle", post(handler::settle))
        .route("/{id}/move", post(handler::move_to_table))
}
