//! Member API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{Member, MemberCreate, MemberUpdate};

use crate::core::AppState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Name fragment or phone prefix
    pub q: Option<String>,
}

/// GET /api/members - 获取会员（`?q=` 按姓名或手机号搜索）
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Member>>> {
    let members = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.members.search(q),
        _ => state.members.all(),
    };
    Ok(Json(members))
}

/// GET /api/members/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Member>> {
    state
        .members
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Member {id} not found")))
}

/// POST /api/members
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<MemberCreate>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.members.add_member(payload)?))
}

/// PUT /api/members/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MemberUpdate>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.members.update_member(&id, payload)?))
}

/// DELETE /api/members/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.members.delete_member(&id)?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{call, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_member_search_and_duplicate_phone() {
        let state = state();
        let (status, _) = call(
            &state,
            "POST",
            "/api/members",
            Some(json!({"name": "Ada Lovelace", "phone": "0612345678"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &state,
            "POST",
            "/api/members",
            Some(json!({"name": "Someone Else", "phone": "0612345678"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "E0004");

        let (_, found) = call(&state, "GET", "/api/members?q=lovelace", None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        let (_, found) = call(&state, "GET", "/api/members?q=0612", None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        let (_, found) = call(&state, "GET", "/api/members?q=zzz", None).await;
        assert!(found.as_array().unwrap().is_empty());
    }
}
