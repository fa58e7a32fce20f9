//! Rendered care plan document

use super::get_stored;
use crate::error::ApiResult;
use crate::services::{CarePlanDocument, RenderedDocument};
use crate::state::{AppState, StoredCarePlan};

/// Render a stored plan with the configured renderer
pub fn render(state: &AppState, stored: &StoredCarePlan) -> ApiResult<RenderedDocument> {
    let document = CarePlanDocument {
        patient: stored.patient.clone(),
        language: stored.language,
        plan: stored.plan.clone(),
    };
    Ok(state.services.documents.render(&document)?)
}

#[tracing::instrument(skip(state))]
pub async fn handle(state: &AppState, user: &str, subject_id: i64) -> ApiResult<RenderedDocument> {
    let stored = get_stored(state, user, subject_id).await?;
    let rendered = render(state, &stored)?;

    tracing::debug!(pages = rendered.pages, file = %rendered.file_name, "care plan rendered");
    Ok(rendered)
}
