use sqlx::PgPool;

use crate::db::predictions::{self, PredictionAnalytics, PredictionLogEntry, RECENT_LIMIT};
use crate::error::ApiResult;

/// The last [`RECENT_LIMIT`] predictions, newest first
#[tracing::instrument(skip(pool))]
pub async fn recent(pool: &PgPool) -> ApiResult<Vec<PredictionLogEntry>> {
    Ok(predictions::recent(pool, RECENT_LIMIT).await?)
}

/// Counts by class, by risk bucket, and per day
#[tracing::instrument(skip(pool))]
pub async fn analytics(pool: &PgPool) -> ApiResult<PredictionAnalytics> {
    Ok(predictions::analytics(pool).await?)
}
