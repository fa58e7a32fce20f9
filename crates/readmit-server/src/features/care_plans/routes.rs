//! Care plan API routes
//!
//! - `POST /api/v1/care-plans` - Generate a plan for a subject
//! - `GET /api/v1/care-plans/:subject_id` - The caller's stored plan
//! - `POST /api/v1/care-plans/:subject_id/language` - Regenerate in another language
//! - `GET /api/v1/care-plans/:subject_id/audio?lang=hi` - Spoken plan (MP3)
//! - `GET /api/v1/care-plans/:subject_id/document` - Paginated PDF
//! - `POST /api/v1/care-plans/:subject_id/email` - Mail the document

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::commands::{ChangeLanguageCommand, EmailCarePlanCommand, GenerateCarePlanCommand};
use super::queries::{audio::AUDIO_CONTENT_TYPE, CarePlanAudioQuery};
use crate::api::response::ApiResponse;
use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn care_plans_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(generate_care_plan))
        .route("/:subject_id", get(get_care_plan))
        .route("/:subject_id/language", post(change_language))
        .route("/:subject_id/audio", get(care_plan_audio))
        .route("/:subject_id/document", get(care_plan_document))
        .route("/:subject_id/email", post(email_care_plan))
}

// ============================================================================
// Command Handlers
// ============================================================================

/// # Response
///
/// - `200 OK` - The stored plan; `generation_error` is set when the
///   narrative service failed
/// - `404 Not Found` - No row for the subject
#[tracing::instrument(skip(state, command), fields(user = %user.id(), subject_id = command.subject_id))]
async fn generate_care_plan(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(command): Json<GenerateCarePlanCommand>,
) -> ApiResult<Response> {
    let stored = super::commands::generate::handle(&state, user.id(), command).await?;

    tracing::info!(
        language = %stored.language,
        failed = stored.generation_error.is_some(),
        "Care plan generated via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(stored))).into_response())
}

/// # Response
///
/// - `200 OK` - `regenerated` tells whether the plan changed
/// - `404 Not Found` - No stored plan for the caller and subject
#[tracing::instrument(skip(state, command), fields(user = %user.id()))]
async fn change_language(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Json(command): Json<ChangeLanguageCommand>,
) -> ApiResult<Response> {
    let response =
        super::commands::change_language::handle(&state, user.id(), subject_id, command).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// # Response
///
/// - `200 OK` - Notification id of the delivered mail
/// - `400 Bad Request` - Invalid recipient
/// - `404 Not Found` - No stored plan
/// - `502 Bad Gateway` - Mail service refused the message (the attempt is
///   still recorded)
#[tracing::instrument(skip(state, command), fields(user = %user.id()))]
async fn email_care_plan(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Json(command): Json<EmailCarePlanCommand>,
) -> ApiResult<Response> {
    let response = super::commands::email::handle(&state, user.id(), subject_id, command).await?;

    tracing::info!(
        notification_id = response.notification_id,
        "Care plan emailed via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers
// ============================================================================

#[tracing::instrument(skip(state), fields(user = %user.id()))]
async fn get_care_plan(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
) -> ApiResult<Response> {
    let stored = super::queries::get_stored(&state, user.id(), subject_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(stored))).into_response())
}

#[tracing::instrument(skip(state), fields(user = %user.id()))]
async fn care_plan_audio(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Query(query): Query<CarePlanAudioQuery>,
) -> ApiResult<Response> {
    let audio = super::queries::audio::handle(&state, user.id(), subject_id, query).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition("inline", &audio.file_name)),
        ],
        audio.bytes,
    )
        .into_response())
}

#[tracing::instrument(skip(state), fields(user = %user.id()))]
async fn care_plan_document(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
) -> ApiResult<Response> {
    let rendered = super::queries::document::handle(&state, user.id(), subject_id).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(rendered.content_type)),
            (header::CONTENT_DISPOSITION, disposition("attachment", &rendered.file_name)),
        ],
        rendered.bytes,
    )
        .into_response())
}

/// `Content-Disposition` value; the bare kind when the name is not a valid
/// header value
fn disposition(kind: &'static str, file_name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}; filename=\"{}\"", kind, file_name))
        .unwrap_or_else(|_| HeaderValue::from_static(kind))
}
