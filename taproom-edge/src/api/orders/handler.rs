//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{Order, OrderAmendment, OrderCreate, OrderStatus, OrderUpdate};

use crate::core::AppState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub table_number: Option<u32>,
    /// Only pending/preparing/completed orders
    #[serde(default)]
    pub live: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub table_number: u32,
}

/// GET /api/orders - 获取订单（可按状态、桌号过滤）
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let mut orders = match query.table_number {
        Some(number) => state.orders.by_table(number),
        None if query.live => state.orders.live(),
        None => state.orders.all(),
    };
    if let Some(status) = query.status {
        orders.retain(|o| o.status == status);
    }
    if query.live {
        orders.retain(Order::is_live);
    }
    Ok(Json(orders))
}

/// GET /api/orders/:id - 获取单个订单
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    state
        .orders
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))
}

/// POST /api/orders - 开单并占用桌台（行项目按酒单重建）
pub async fn create(
    State(state): State<AppState>,
    Json(mut payload): Json<OrderCreate>,
) -> AppResult<Json<Order>> {
    payload.items = state.menu.resolve_items(&payload.items)?;
    let order = state.coordinator.create_order_and_occupy_table(payload)?;
    Ok(Json(order))
}

/// PUT /api/orders/:id - 修改订单字段（不含状态与桌台）
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderUpdate>,
) -> AppResult<Json<Order>> {
    let order = state.orders.update_order(&id, payload)?;
    Ok(Json(order))
}

/// DELETE /api/orders/:id - 删除订单并释放桌台
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.coordinator.delete_order_and_release_table(&id)?;
    Ok(Json(order))
}

/// POST /api/orders/:id/amend - 加单（行项目按酒单重建）
pub async fn amend(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut payload): Json<OrderAmendment>,
) -> AppResult<Json<Order>> {
    payload.add_items = state.menu.resolve_items(&payload.add_items)?;
    let order = state.coordinator.amend_existing_order(&id, payload)?;
    Ok(Json(order))
}

/// POST /api/orders/:id/status - 状态流转
pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> AppResult<Json<Order>> {
    let order = state.coordinator.transition(&id, payload.status)?;
    Ok(Json(order))
}

/// POST /api/orders/:id/settle - 已付款订单结账并释放桌台
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.coordinator.settle_and_release(&id)?;
    Ok(Json(order))
}

/// POST /api/orders/:id/move - 换桌
pub async fn move_to_table(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MovePayload>,
) -> AppResult<Json<Order>> {
    let order = state.coordinator.move_order(&id, payload.table_number)?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{call, state};
    use axum::http::StatusCode;
    use serde_json::json;
    use shared::models::{DiningTableCreate, MenuItemCreate};

    use crate::core::AppState;

    fn seed(state: &AppState) {
        state.tables.add_table(DiningTableCreate::default()).unwrap();
        state
            .menu
            .add_menu_item(MenuItemCreate {
                id: Some("ipa".into()),
                name: "IPA".into(),
                category: "beer".into(),
                price: 6.5,
                ..Default::default()
            })
            .unwrap();
    }

    fn order_body(table: u32) -> serde_json::Value {
        json!({
            "tableNumber": table,
            "customers": 2,
            "items": [{"id": "ipa", "name": "IPA", "price": 6.5, "quantity": 2}]
        })
    }

    #[tokio::test]
    async fn test_create_occupies_table() {
        let state = state();
        seed(&state);

        let (status, order) = call(&state, "POST", "/api/orders", Some(order_body(1))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["total"], 13.0);

        let table = state.tables.by_number(1).unwrap();
        assert_eq!(table.order_id.as_deref(), order["id"].as_str());

        let (status, body) = call(&state, "POST", "/api/orders", Some(order_body(1))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "E1001");
    }

    #[tokio::test]
    async fn test_missing_table_number_is_bad_request() {
        let state = state();
        let (status, body) = call(&state, "POST", "/api/orders", Some(json!({"items": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E0002");
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_through_settle() {
        let state = state();
        seed(&state);
        let (_, order) = call(&state, "POST", "/api/orders", Some(order_body(1))).await;
        let id = order["id"].as_str().unwrap().to_string();

        let (status, body) = call(&state, "POST", &format!("/api/orders/{id}/settle"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("not yet settled"));

        for next in ["preparing", "completed", "paid"] {
            let (status, _) = call(
                &state,
                "POST",
                &format!("/api/orders/{id}/status"),
                Some(json!({"status": next})),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "transition to {next}");
        }

        let (status, _) = call(&state, "POST", &format!("/api/orders/{id}/settle"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.tables.by_number(1).unwrap().order_id, None);
    }

    #[tokio::test]
    async fn test_amend_and_filter() {
        let state = state();
        seed(&state);
        let (_, order) = call(&state, "POST", "/api/orders", Some(order_body(1))).await;
        let id = order["id"].as_str().unwrap().to_string();

        let (status, amended) = call(
            &state,
            "POST",
            &format!("/api/orders/{id}/amend"),
            Some(json!({"addItems": [{"id": "ipa", "name": "IPA", "price": 6.5, "quantity": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(amended["items"][0]["quantity"], 3);
        assert_eq!(amended["total"], 19.5);

        let (_, listed) = call(&state, "GET", "/api/orders?tableNumber=1&live=true", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        let (_, listed) = call(&state, "GET", "/api/orders?status=paid", None).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lines_are_rebuilt_from_menu() {
        let state = state();
        seed(&state);
        let (status, order) = call(
            &state,
            "POST",
            "/api/orders",
            Some(json!({"tableNumber": 1, "items": [{"id": "ipa", "price": 0.5, "quantity": 2}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["items"][0]["name"], "IPA");
        assert_eq!(order["total"], 13.0);
        let id = order["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &state,
            "POST",
            &format!("/api/orders/{id}/amend"),
            Some(json!({"addItems": [{"id": "ghost", "price": 1.0, "quantity": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("ghost"));

        state
            .menu
            .update_menu_item(
                "ipa",
                shared::models::MenuItemUpdate {
                    available: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let (status, _) = call(
            &state,
            "POST",
            &format!("/api/orders/{id}/amend"),
            Some(json!({"addItems": [{"id": "ipa", "price": 6.5, "quantity": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.orders.get(&id).unwrap().items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_delete_releases_table() {
        let state = state();
        seed(&state);
        let (_, order) = call(&state, "POST", "/api/orders", Some(order_body(1))).await;
        let id = order["id"].as_str().unwrap().to_string();

        let (status, _) = call(&state, "DELETE", &format!("/api/orders/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.tables.by_number(1).unwrap().is_occupied());

        let (status, _) = call(&state, "GET", &format!("/api/orders/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
