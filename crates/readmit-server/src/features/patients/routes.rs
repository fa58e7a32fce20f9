//! Patient API routes
//!
//! - `GET /api/v1/patients?limit=50` - Most recently loaded patients
//! - `GET /api/v1/patients/:subject_id` - One patient with its risk category

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::queries::{GetPatientQuery, ListPatientsQuery};
use crate::api::response::ApiResponse;
use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn patients_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients))
        .route("/:subject_id", get(get_patient))
}

#[tracing::instrument(skip(state, _user), fields(limit = ?query.limit))]
async fn list_patients(
    _user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
) -> ApiResult<Response> {
    let limit = query.limit();
    let records = super::queries::list::handle(&state.db, &state.pipeline, query).await?;

    tracing::debug!(count = records.len(), "Patients listed via API");

    let meta = json!({ "count": records.len(), "limit": limit });
    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(records, meta))).into_response())
}

/// # Response
///
/// - `200 OK` - Registry-shaped record plus `risk_category`
/// - `404 Not Found` - No row for the subject
#[tracing::instrument(skip(state, _user))]
async fn get_patient(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
) -> ApiResult<Response> {
    let record =
        super::queries::get::handle(&state.db, &state.pipeline, GetPatientQuery { subject_id })
            .await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(record))).into_response())
}
