//! Middleware for the readmit server
//!
//! - CORS (Cross-Origin Resource Sharing)
//! - Request logging with tracing
//! - Caller identity from the `x-user-id` header

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName, Method},
};
use std::time::Duration;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::CorsConfig;
use crate::error::AppError;

/// Header carrying the identity established by the upstream identity provider
pub const USER_ID_HEADER: &str = "x-user-id";

/// Longest accepted user id
const MAX_USER_ID_LEN: usize = 256;

/// Create CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_LANGUAGE,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.allow_credentials {
        cors = cors.allow_credentials(true);
    }

    cors
}

/// Create tracing/logging layer
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Authenticated caller, as asserted by the `x-user-id` header
///
/// Handlers that take this extractor reject requests without the header
/// with `401 Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        let user = value
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("{} is not valid text", USER_ID_HEADER)))?
            .trim();

        if user.is_empty() || user.len() > MAX_USER_ID_LEN {
            return Err(AppError::Unauthorized(format!(
                "{} must be 1 to {} characters",
                USER_ID_HEADER, MAX_USER_ID_LEN
            )));
        }

        Ok(CurrentUser(user.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[test]
    fn test_cors_layer_with_specific_origins() {
        let config = CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://clinic.example.com".to_string(),
            ],
            allow_credentials: true,
        };

        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_cors_layer_with_wildcard() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        };

        let _layer = cors_layer(&config);
    }

    #[tokio::test]
    async fn test_current_user_from_header() {
        let user = extract(Some(" nurse-17 ")).await.unwrap();
        assert_eq!(user.id(), "nurse-17");
    }

    #[tokio::test]
    async fn test_missing_or_blank_user_is_unauthorized() {
        for header in [None, Some(""), Some("   ")] {
            let err = extract(header).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }
}
