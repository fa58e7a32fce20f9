//! Prediction log

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::DbResult;
use crate::services::Prediction;

pub const RECENT_LIMIT: i64 = 20;

/// Probability (percent) at or above which a prediction counts as high risk
pub const HIGH_RISK_THRESHOLD: f64 = 65.0;

/// Probability (percent) at or above which a prediction counts as medium risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 35.0;

/// Days covered by the analytics trend
pub const TREND_DAYS: i32 = 14;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PredictionLogEntry {
    pub id: i64,
    pub subject_id: i64,
    pub requested_by: String,
    pub predicted_class: i32,
    pub probability: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ClassCount {
    pub predicted_class: i32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BucketCount {
    pub bucket: String,
    pub count: i64,
}

/// One day of the analytics trend
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyTrend {
    pub day: NaiveDate,
    pub predictions: i64,
    pub readmissions: i64,
    /// Mean predicted probability that day, in percent
    pub avg_probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionAnalytics {
    pub total: i64,
    pub by_class: Vec<ClassCount>,
    pub by_risk: Vec<BucketCount>,
    pub trend: Vec<DailyTrend>,
}

/// Risk bucket for a probability in percent
pub fn risk_bucket(probability: f64) -> &'static str {
    if probability >= HIGH_RISK_THRESHOLD {
        "High"
    } else if probability >= MEDIUM_RISK_THRESHOLD {
        "Medium"
    } else {
        "Low"
    }
}

// ============================================================================
// Operations
// ============================================================================

pub async fn insert(
    pool: &PgPool,
    subject_id: i64,
    requested_by: &str,
    prediction: &Prediction,
) -> DbResult<PredictionLogEntry> {
    let entry = sqlx::query_as::<_, PredictionLogEntry>(
        r#"
        INSERT INTO prediction_log (subject_id, requested_by, predicted_class, probability)
        VALUES ($1, $2, $3, $4)
        RETURNING id, subject_id, requested_by, predicted_class, probability, created_at
        "#,
    )
    .bind(subject_id)
    .bind(requested_by)
    .bind(prediction.predicted_class)
    .bind(prediction.probability)
    .fetch_one(pool)
    .await?;

    Ok(entry)
}

/// Newest predictions first
pub async fn recent(pool: &PgPool, limit: i64) -> DbResult<Vec<PredictionLogEntry>> {
    let entries = sqlx::query_as::<_, PredictionLogEntry>(
        r#"
        SELECT id, subject_id, requested_by, predicted_class, probability, created_at
        FROM prediction_log
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

const TREND_QUERY: &str = r#"
    SELECT (created_at AT TIME ZONE 'UTC')::date AS day,
           COUNT(*) AS predictions,
           COUNT(*) FILTER (WHERE predicted_class = 1) AS readmissions,
           AVG(probability)::float8 AS avg_probability
    FROM prediction_log
    WHERE created_at >= NOW() - make_interval(days => $1)
    GROUP BY 1
    ORDER BY 1
"#;

pub async fn analytics(pool: &PgPool) -> DbResult<PredictionAnalytics> {
    let by_class = sqlx::query_as::<_, ClassCount>(
        r#"
        SELECT predicted_class, COUNT(*) AS count
        FROM prediction_log
        GROUP BY predicted_class
        ORDER BY predicted_class
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_risk = sqlx::query_as::<_, BucketCount>(
        r#"
        SELECT CASE
                   WHEN probability >= $1 THEN 'High'
                   WHEN probability >= $2 THEN 'Medium'
                   ELSE 'Low'
               END AS bucket,
               COUNT(*) AS count
        FROM prediction_log
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(HIGH_RISK_THRESHOLD)
    .bind(MEDIUM_RISK_THRESHOLD)
    .fetch_all(pool)
    .await?;

    let trend = sqlx::query_as::<_, DailyTrend>(TREND_QUERY)
        .bind(TREND_DAYS)
        .fetch_all(pool)
        .await?;

    let total = by_class.iter().map(|c| c.count).sum();

    Ok(PredictionAnalytics {
        total,
        by_class,
        by_risk,
        trend,
    })
}
