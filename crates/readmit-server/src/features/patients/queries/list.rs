use readmit_etl::Pipeline;
use serde::Deserialize;
use sqlx::PgPool;

use crate::db::patients::{self, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::error::{ApiResult, AppError};
use crate::patient::PatientRecord;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPatientsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl ListPatientsQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIST_LIMIT).contains(&limit) {
                return Err(AppError::Validation(format!(
                    "limit must be between 1 and {}",
                    MAX_LIST_LIMIT
                )));
            }
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

#[tracing::instrument(skip(pool, pipeline))]
pub async fn handle(
    pool: &PgPool,
    pipeline: &Pipeline,
    query: ListPatientsQuery,
) -> ApiResult<Vec<PatientRecord>> {
    query.validate()?;

    let config = pipeline.config();
    let records =
        patients::list_recent(pool, &config.destination, &config.registry, query.limit()).await?;
    Ok(records)
}
