//! Data Transfer handlers (delegate to [`crate::data_transfer`])

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::core::AppState;
use crate::data_transfer::{self, ImportSummary};
use crate::utils::AppResult;

/// GET /api/data-transfer/export
pub async fn export(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let backup = data_transfer::export(&state)?;
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"taproom_backup.json\"",
        )],
        Json(backup),
    ))
}

/// POST /api/data-transfer/import
pub async fn import(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> AppResult<Json<ImportSummary>> {
    Ok(Json(data_transfer::import(&state, document)?))
}

/// POST /api/data-transfer/clear
pub async fn clear(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let removed = data_transfer::clear_all_data(&state);
    Ok(Json(json!({ "ordersRemoved": removed })))
}
