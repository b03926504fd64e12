//! Menu API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{MenuItem, MenuItemCreate, MenuItemUpdate};

use crate::core::AppState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    /// Hide items marked unavailable
    #[serde(default)]
    pub available: bool,
}

/// GET /api/menu-items - 获取酒单
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<MenuItem>>> {
    let mut items = match &query.category {
        Some(category) => state.menu.by_category(category),
        None => state.menu.all(),
    };
    if query.available {
        items.retain(|m| m.available);
    }
    Ok(Json(items))
}

/// GET /api/menu-items/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MenuItem>> {
    state
        .menu
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Menu item {id} not found")))
}

/// POST /api/menu-items
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<MenuItemCreate>,
) -> AppResult<Json<MenuItem>> {
    Ok(Json(state.menu.add_menu_item(payload)?))
}

/// PUT /api/menu-items/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MenuItemUpdate>,
) -> AppResult<Json<MenuItem>> {
    Ok(Json(state.menu.update_menu_item(&id, payload)?))
}

/// DELETE /api/menu-items/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MenuItem>> {
    Ok(Json(state.menu.delete_menu_item(&id)?))
}
