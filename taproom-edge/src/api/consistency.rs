//! 订单/桌台一致性路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/consistency | GET | 只读检查 |
//! | /api/consistency/repair | POST | 修复桌台侧的引用 |

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::coordinator::ConsistencyReport;
use crate::core::AppState;
use crate::utils::AppResult;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/consistency", get(check))
        .route("/api/consistency/repair", post(repair))
}

/// GET /api/consistency
async fn check(State(state): State<AppState>) -> AppResult<Json<ConsistencyReport>> {
    Ok(Json(state.coordinator.check_consistency()))
}

/// POST /api/consistency/repair
async fn repair(State(state): State<AppState>) -> AppResult<Json<ConsistencyReport>> {
    Ok(Json(state.coordinator.repair_consistency()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, state};
    use axum::http::StatusCode;
    use shared::models::{DiningTable, TableStatus};

    #[tokio::test]
    async fn test_check_then_repair_dangling_reference() {
        let state = state();
        state.tables.set_tables(vec![DiningTable {
            id: 1,
            number: 1,
            name: "Table 1".into(),
            status: TableStatus::Occupied,
            customers: 2,
            max_capacity: 4,
            position: Default::default(),
            order_id: Some("gone".into()),
            created_at: 0,
            updated_at: 0,
        }]);

        let (status, report) = call(&state, "GET", "/api/consistency", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["issues"][0]["kind"], "danglingOrder");

        let (_, report) = call(&state, "POST", "/api/consistency/repair", None).await;
        assert_eq!(report["repaired"], 1);
        assert!(state.coordinator.check_consistency().is_clean());
    }
}
