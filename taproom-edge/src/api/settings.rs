//! 店铺设置路由
//!
//! 设置只保存在本地，不参与远端同步。

use axum::{Json, Router, extract::State, routing::get};
use shared::models::{Settings, SettingsUpdate};

use crate::core::AppState;
use crate::utils::AppResult;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(update_settings))
}

/// GET /api/settings
async fn get_settings(State(state): State<AppState>) -> AppResult<Json<Settings>> {
    Ok(Json(state.settings.get()))
}

/// PUT /api/settings
async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<SettingsUpdate>,
) -> AppResult<Json<Settings>> {
    Ok(Json(state.settings.update(payload)?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_settings() {
        let state = state();
        let (status, body) = call(
            &state,
            "PUT",
            "/api/settings",
            Some(json!({"barName": "The Tap", "autoSync": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["barName"], "The Tap");
        assert!(!state.settings.get().auto_sync);

        let (status, _) = call(&state, "PUT", "/api/settings", Some(json!({"taxRatePercent": 150.0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.settings.get().tax_rate_percent, 0.0);
    }
}
