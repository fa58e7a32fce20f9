//! Upload API routes
//!
//! - `POST /api/v1/uploads` - Load a CSV file (multipart field `csv_file`)

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::UploadCsvCommand;
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "csv_file";

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn uploads_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Load an uploaded CSV file
///
/// # Response
///
/// - `201 Created` - Rows loaded, with the load summary
/// - `400 Bad Request` - No file, or an empty file
/// - `422 Unprocessable Entity` - Unreadable CSV, or no registry columns
/// - `500 Internal Server Error` - Warehouse insert failed
#[tracing::instrument(skip(state, multipart), fields(user = %user.id()))]
async fn upload_csv(
    user: CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut command = UploadCsvCommand {
        file_name: None,
        content: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        command.file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        command.content = Some(data.to_vec());
    }

    let response = super::commands::upload::handle(&state.pipeline, command).await?;

    tracing::info!(
        source = %response.summary.source_name,
        rows = response.summary.rows_loaded,
        checksum = %response.summary.checksum,
        "CSV uploaded via API"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}
