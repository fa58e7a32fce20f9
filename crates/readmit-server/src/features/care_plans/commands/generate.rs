//! Generate care plan command
//!
//! Writes a plan for one patient in the requested language and stores it
//! for the caller. A narrative-service failure still produces a plan: its
//! risk explanation carries the error and every list is empty.

use chrono::Utc;
use serde::Deserialize;

use crate::care_plan::{extract_care_plan, CarePlan, Language};
use crate::error::ApiResult;
use crate::features::patients::queries::{get, GetPatientQuery};
use crate::features::shared::validate_subject_id;
use crate::patient::PatientSummary;
use crate::services::Services;
use crate::state::{AppState, StoredCarePlan};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCarePlanCommand {
    pub subject_id: i64,
    /// Name or code; unknown values fall back to English
    #[serde(default)]
    pub language: Language,
}

impl GenerateCarePlanCommand {
    pub fn validate(&self) -> ApiResult<()> {
        validate_subject_id(self.subject_id)
    }
}

/// Outcome of one narrative request
#[derive(Debug, Clone)]
pub struct Generated {
    pub plan: CarePlan,
    pub error: Option<String>,
}

/// Ask the narrative service for a plan and extract it from the reply
pub async fn generate_plan(
    services: &Services,
    patient: &PatientSummary,
    language: Language,
) -> Generated {
    match services.narrative.generate(patient, language).await {
        Ok(text) => Generated {
            plan: extract_care_plan(&text),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, subject_id = ?patient.subject_id, "care plan generation failed");
            Generated {
                plan: CarePlan::failed(&e),
                error: Some(e.to_string()),
            }
        },
    }
}

#[tracing::instrument(skip(state), fields(subject_id = command.subject_id, language = %command.language))]
pub async fn handle(
    state: &AppState,
    user: &str,
    command: GenerateCarePlanCommand,
) -> ApiResult<StoredCarePlan> {
    command.validate()?;

    let record = get::handle(
        &state.db,
        &state.pipeline,
        GetPatientQuery {
            subject_id: command.subject_id,
        },
    )
    .await?;
    let patient = record.summary();

    let generated = generate_plan(&state.services, &patient, command.language).await;
    let stored = StoredCarePlan {
        patient,
        language: command.language,
        plan: generated.plan,
        generated_at: Utc::now(),
        generation_error: generated.error,
    };

    state
        .care_plans
        .put(user, command.subject_id, stored.clone())
        .await;

    Ok(stored)
}
