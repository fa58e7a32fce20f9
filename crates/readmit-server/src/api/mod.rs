//! HTTP surface: the application router and health check

pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::config::CorsConfig;
use crate::db;
use crate::features;
use crate::middleware;
use crate::state::AppState;

/// `/health` plus every feature under `/api/v1`
///
/// Layers wrap outward: compression, then request tracing, then CORS.
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone())
        .nest("/api/v1", features::router(state))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

/// `200` when the warehouse answers, `503` otherwise
async fn health_check(State(state): State<AppState>) -> Response {
    let destination = state.pipeline.config().destination.clone();

    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "destination": destination,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Warehouse health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable",
                    "destination": destination,
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
                .into_response()
        },
    }
}
