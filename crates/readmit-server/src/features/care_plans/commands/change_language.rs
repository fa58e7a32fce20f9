//! Change care plan language command
//!
//! Regenerates a stored plan in another language. When generation fails the
//! stored plan and its language are left untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::generate::generate_plan;
use crate::care_plan::Language;
use crate::error::{ApiResult, AppError};
use crate::state::{AppState, StoredCarePlan};

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeLanguageCommand {
    pub language: Language,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeLanguageResponse {
    /// False when the previous plan was kept
    pub regenerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub care_plan: StoredCarePlan,
}

#[tracing::instrument(skip(state), fields(language = %command.language))]
pub async fn handle(
    state: &AppState,
    user: &str,
    subject_id: i64,
    command: ChangeLanguageCommand,
) -> ApiResult<ChangeLanguageResponse> {
    let previous = state.care_plans.get(user, subject_id).await.ok_or_else(|| {
        AppError::NotFound(format!(
            "No care plan for subject_id {}; generate one first",
            subject_id
        ))
    })?;

    let generated = generate_plan(&state.services, &previous.patient, command.language).await;
    if let Some(error) = generated.error {
        return Ok(ChangeLanguageResponse {
            regenerated: false,
            error: Some(error),
            care_plan: previous,
        });
    }

    let stored = StoredCarePlan {
        patient: previous.patient,
        language: command.language,
        plan: generated.plan,
        generated_at: Utc::now(),
        generation_error: None,
    };
    state.care_plans.put(user, subject_id, stored.clone()).await;

    Ok(ChangeLanguageResponse {
        regenerated: true,
        error: None,
        care_plan: stored,
    })
}
