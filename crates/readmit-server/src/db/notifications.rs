//! Notification records

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::DbResult;

pub const EMAIL_CHANNEL: &str = "email";

/// Feed size when the caller gives no limit
pub const DEFAULT_FEED_LIMIT: i64 = 30;
pub const MAX_FEED_LIMIT: i64 = 200;

const RECENT_QUERY: &str = r#"
    SELECT id, subject_id, sent_by, recipient, channel, delivered, detail, created_at
    FROM notifications
    ORDER BY created_at DESC, id DESC
    LIMIT $1
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct NotificationEntry {
    pub id: i64,
    pub subject_id: i64,
    pub sent_by: String,
    pub recipient: String,
    pub channel: String,
    pub delivered: bool,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub subject_id: i64,
    pub sent_by: &'a str,
    pub recipient: &'a str,
    pub delivered: bool,
    /// Failure reason, when not delivered
    pub detail: Option<String>,
}

/// Record one delivery attempt, returning its id
pub async fn insert(pool: &PgPool, notification: &NewNotification<'_>) -> DbResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO notifications (subject_id, sent_by, recipient, channel, delivered, detail)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(notification.subject_id)
    .bind(notification.sent_by)
    .bind(notification.recipient)
    .bind(EMAIL_CHANNEL)
    .bind(notification.delivered)
    .bind(notification.detail.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Newest delivery attempts first, delivered or not
pub async fn recent(pool: &PgPool, limit: i64) -> DbResult<Vec<NotificationEntry>> {
    let entries = sqlx::query_as::<_, NotificationEntry>(RECENT_QUERY)
        .bind(limit.clamp(1, MAX_FEED_LIMIT))
        .fetch_all(pool)
        .await?;

    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recent_query_orders_newest_first() {
        assert!(RECENT_QUERY.contains("ORDER BY created_at DESC, id DESC"));
        assert!(RECENT_QUERY.contains("LIMIT $1"));
        assert!(DEFAULT_FEED_LIMIT <= MAX_FEED_LIMIT);
    }

    #[test]
    fn test_entry_serializes_failure_detail() {
        let entry = NotificationEntry {
            id: 7,
            subject_id: 42,
            sent_by: "nurse-1".to_string(),
            recipient: "family@example.com".to_string(),
            channel: EMAIL_CHANNEL.to_string(),
            delivered: false,
            detail: Some("SMTP relay refused".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["delivered"], serde_json::json!(false));
        assert_eq!(json["detail"], serde_json::json!("SMTP relay refused"));
        assert_eq!(json["channel"], serde_json::json!("email"));
    }
}
