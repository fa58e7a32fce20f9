use serde::Deserialize;
use sqlx::PgPool;

use crate::db::notifications::{self, NotificationEntry, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT};
use crate::error::{ApiResult, AppError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentNotificationsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl RecentNotificationsQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_FEED_LIMIT).contains(&limit) {
                return Err(AppError::Validation(format!(
                    "limit must be between 1 and {}",
                    MAX_FEED_LIMIT
                )));
            }
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_FEED_LIMIT)
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: &PgPool,
    query: RecentNotificationsQuery,
) -> ApiResult<Vec<NotificationEntry>> {
    query.validate()?;
    Ok(notifications::recent(pool, query.limit()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_limit_defaults_to_thirty() {
        assert_eq!(RecentNotificationsQuery::default().limit(), 30);
        assert!(RecentNotificationsQuery { limit: Some(200) }.validate().is_ok());
        assert!(RecentNotificationsQuery { limit: Some(0) }.validate().is_err());
        assert!(RecentNotificationsQuery { limit: Some(201) }.validate().is_err());
    }
}
