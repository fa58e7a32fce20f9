use readmit_etl::Pipeline;
use sqlx::PgPool;

use crate::db::patients;
use crate::error::{ApiResult, AppError};
use crate::features::shared::validate_subject_id;
use crate::patient::PatientRecord;

#[derive(Debug, Clone, Copy)]
pub struct GetPatientQuery {
    pub subject_id: i64,
}

impl GetPatientQuery {
    pub fn validate(&self) -> ApiResult<()> {
        validate_subject_id(self.subject_id)
    }
}

/// Newest warehouse row for the subject
///
/// Shared by the prediction and care-plan commands, which start from the
/// same record.
#[tracing::instrument(skip(pool, pipeline))]
pub async fn handle(
    pool: &PgPool,
    pipeline: &Pipeline,
    query: GetPatientQuery,
) -> ApiResult<PatientRecord> {
    query.validate()?;

    let config = pipeline.config();
    patients::get_by_subject(pool, &config.destination, &config.registry, query.subject_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Patient with subject_id {} not found", query.subject_id))
        })
}
