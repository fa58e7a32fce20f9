//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use readmit_etl::EtlError;
use serde_json::json;
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::db::DbError;
use crate::services::ServiceError;

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] EtlError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Pipeline(e) => e.code(),
            AppError::Service(_) => "UPSTREAM_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Pipeline(e) => match e {
                EtlError::Extraction { .. } | EtlError::SchemaMismatch { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                },
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Service(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                ErrorResponse::new(code, "A database error occurred")
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                ErrorResponse::new(code, "An internal error occurred")
            },
            AppError::NotFound(message)
            | AppError::Validation(message)
            | AppError::Unauthorized(message)
            | AppError::BadRequest(message) => ErrorResponse::new(code, message),
            AppError::Pipeline(EtlError::Load {
                ref destination,
                batch,
                committed_rows,
                ..
            }) => {
                tracing::error!(error = %self, "upload load failed");
                ErrorResponse::with_details(
                    code,
                    self.to_string(),
                    json!({
                        "destination": destination,
                        "batch": batch,
                        "committed_rows": committed_rows,
                    }),
                )
            },
            AppError::Pipeline(ref e) => {
                tracing::warn!(error = %e, "upload rejected");
                ErrorResponse::new(code, e.to_string())
            },
            AppError::Service(ref e) => {
                tracing::error!(error = %e, "collaborator call failed");
                ErrorResponse::new(code, e.to_string())
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => AppError::Database(e),
            DbError::InvalidTable(message) => AppError::Internal(message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_is_unprocessable() {
        let err = AppError::from(EtlError::SchemaMismatch {
            source_name: "weather.csv".to_string(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "SCHEMA_MISMATCH");
    }

    #[test]
    fn test_load_failure_is_server_error() {
        let err = AppError::from(EtlError::Load {
            destination: "readmission".to_string(),
            batch: 1,
            committed_rows: 1000,
            cause: anyhow::anyhow!("connection reset"),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "LOAD_ERROR");
    }

    #[test]
    fn test_upstream_failure_is_bad_gateway() {
        let err = AppError::from(ServiceError::InvalidResponse {
            service: "prediction",
            reason: "missing probability".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
