//! Dining Table API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{DiningTable, DiningTableCreate, DiningTableUpdate};

use crate::core::AppState;
use crate::utils::{AppError, AppResult};

/// GET /api/tables - 获取所有桌台
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<DiningTable>>> {
    Ok(Json(state.tables.all()))
}

/// GET /api/tables/:id - 获取单个桌台
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DiningTable>> {
    state
        .tables
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Table {id} not found")))
}

/// POST /api/tables - 创建桌台
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<DiningTableCreate>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.add_table(payload)?;
    Ok(Json(table))
}

/// PUT /api/tables/:id - 更新桌台（名称、容量、位置、非占用状态）
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<DiningTableUpdate>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.update_table(id, payload)?;
    Ok(Json(table))
}

/// DELETE /api/tables/:id - 删除桌台
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.delete_table(id)?;
    Ok(Json(table))
}

/// POST /api/tables/reset - 所有桌台恢复空闲
pub async fn reset(State(state): State<AppState>) -> AppResult<Json<Vec<DiningTable>>> {
    state.tables.reset_all_tables();
    Ok(Json(state.tables.all()))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{call, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_update_table() {
        let state = state();
        let (status, table) = call(&state, "POST", "/api/tables", Some(json!({"name": "Bar 1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(table["number"], 1);
        assert_eq!(table["status"], "available");

        let (status, table) = call(
            &state,
            "PUT",
            "/api/tables/1",
            Some(json!({"maxCapacity": 6, "status": "reserved"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(table["maxCapacity"], 6);
        assert_eq!(table["status"], "reserved");
    }

    #[tokio::test]
    async fn test_ui_cannot_occupy_or_link_order() {
        let state = state();
        call(&state, "POST", "/api/tables", Some(json!({}))).await;

        let (status, _) = call(&state, "PUT", "/api/tables/1", Some(json!({"status": "occupied"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        // Unknown fields such as orderId are ignored
        let (status, table) = call(&state, "PUT", "/api/tables/1", Some(json!({"orderId": "o-1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(table.get("orderId").is_none());
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let state = state();
        let (status, body) = call(&state, "GET", "/api/tables/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "E0003");
    }
}
