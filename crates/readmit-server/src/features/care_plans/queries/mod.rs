pub mod audio;
pub mod document;

pub use audio::{CarePlanAudio, CarePlanAudioQuery};

use crate::error::{ApiResult, AppError};
use crate::state::{AppState, StoredCarePlan};

/// The caller's stored plan for a subject
pub async fn get_stored(state: &AppState, user: &str, subject_id: i64) -> ApiResult<StoredCarePlan> {
    state
        .care_plans
        .get(user, subject_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No care plan for subject_id {}", subject_id)))
}
