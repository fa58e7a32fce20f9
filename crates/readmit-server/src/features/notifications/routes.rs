//! Notification API routes
//!
//! - `GET /api/v1/notifications?limit=30` - Newest email attempts, delivered or not

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::queries::RecentNotificationsQuery;
use crate::api::response::ApiResponse;
use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn notifications_routes() -> Router<AppState> {
    Router::new().route("/", get(recent_notifications))
}

#[tracing::instrument(skip(state, _user), fields(limit = ?query.limit))]
async fn recent_notifications(
    _user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<RecentNotificationsQuery>,
) -> ApiResult<Response> {
    let limit = query.limit();
    let entries = super::queries::recent::handle(&state.db, query).await?;

    let meta = json!({ "count": entries.len(), "limit": limit });
    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(entries, meta))).into_response())
}
