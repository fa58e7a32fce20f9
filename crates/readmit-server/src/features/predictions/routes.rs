//! Prediction API routes
//!
//! - `POST /api/v1/predictions` - Predict readmission for one subject
//! - `GET /api/v1/predictions/recent` - Last 20 predictions
//! - `GET /api/v1/predictions/analytics` - Counts by class, risk bucket and day

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::commands::PredictReadmissionCommand;
use crate::api::response::ApiResponse;
use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn predictions_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(predict_readmission))
        .route("/recent", get(recent_predictions))
        .route("/analytics", get(prediction_analytics))
}

/// # Response
///
/// - `200 OK` - `{subject_id, predicted_class, probability, risk_bucket, logged_at}`
/// - `404 Not Found` - No row for the subject
/// - `502 Bad Gateway` - Prediction service failed or answered out of range
#[tracing::instrument(skip(state, command), fields(user = %user.id(), subject_id = command.subject_id))]
async fn predict_readmission(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(command): Json<PredictReadmissionCommand>,
) -> ApiResult<Response> {
    let response = super::commands::predict::handle(&state, user.id(), command).await?;

    tracing::info!(
        subject_id = response.subject_id,
        predicted_class = response.predicted_class,
        probability = response.probability,
        "Prediction served via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, _user))]
async fn recent_predictions(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let entries = super::queries::recent(&state.db).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(entries))).into_response())
}

#[tracing::instrument(skip(state, _user))]
async fn prediction_analytics(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let analytics = super::queries::analytics(&state.db).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(analytics))).into_response())
}
