//! Predict readmission command
//!
//! Fetches the patient's newest record, asks the prediction service for a
//! class and probability, and appends the result to the prediction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::predictions::{self, risk_bucket};
use crate::error::ApiResult;
use crate::features::patients::queries::{get, GetPatientQuery};
use crate::features::shared::validate_subject_id;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictReadmissionCommand {
    pub subject_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictReadmissionResponse {
    pub subject_id: i64,
    pub predicted_class: i32,
    /// Percent
    pub probability: f64,
    pub risk_bucket: &'static str,
    pub logged_at: DateTime<Utc>,
}

impl PredictReadmissionCommand {
    pub fn validate(&self) -> ApiResult<()> {
        validate_subject_id(self.subject_id)
    }
}

#[tracing::instrument(skip(state), fields(subject_id = command.subject_id))]
pub async fn handle(
    state: &AppState,
    requested_by: &str,
    command: PredictReadmissionCommand,
) -> ApiResult<PredictReadmissionResponse> {
    command.validate()?;

    let record = get::handle(
        &state.db,
        &state.pipeline,
        GetPatientQuery {
            subject_id: command.subject_id,
        },
    )
    .await?;

    let prediction = state
        .services
        .prediction
        .predict(&record.prediction_features())
        .await?;

    let entry =
        predictions::insert(&state.db, command.subject_id, requested_by, &prediction).await?;

    Ok(PredictReadmissionResponse {
        subject_id: entry.subject_id,
        predicted_class: entry.predicted_class,
        probability: entry.probability,
        risk_bucket: risk_bucket(entry.probability),
        logged_at: entry.created_at,
    })
}
