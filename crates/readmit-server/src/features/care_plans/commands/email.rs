//! Email care plan command
//!
//! Renders the stored plan, mails it to the recipient and records the
//! attempt in the notifications table, delivered or not.

use serde::{Deserialize, Serialize};

use crate::db::notifications::{self, NewNotification};
use crate::error::ApiResult;
use crate::features::care_plans::queries::{document, get_stored};
use crate::features::shared::validate_email;
use crate::services::mail::{CARE_PLAN_BODY, CARE_PLAN_SUBJECT};
use crate::services::{Attachment, OutgoingMail};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct EmailCarePlanCommand {
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailCarePlanResponse {
    pub notification_id: i64,
    pub recipient: String,
    pub file_name: String,
    pub message: String,
}

impl EmailCarePlanCommand {
    pub fn validate(&self) -> ApiResult<()> {
        validate_email(&self.recipient)?;
        Ok(())
    }
}

#[tracing::instrument(skip(state, command))]
pub async fn handle(
    state: &AppState,
    user: &str,
    subject_id: i64,
    command: EmailCarePlanCommand,
) -> ApiResult<EmailCarePlanResponse> {
    command.validate()?;
    let recipient = command.recipient.trim().to_string();

    let stored = get_stored(state, user, subject_id).await?;
    let rendered = document::render(state, &stored)?;

    let mail = OutgoingMail {
        recipient: recipient.clone(),
        subject: CARE_PLAN_SUBJECT.to_string(),
        body: CARE_PLAN_BODY.to_string(),
        attachment: Some(Attachment {
            file_name: rendered.file_name.clone(),
            content_type: rendered.content_type.to_string(),
            bytes: rendered.bytes,
        }),
    };

    let sent = state.services.mail.send(&mail).await;

    let notification_id = notifications::insert(
        &state.db,
        &NewNotification {
            subject_id,
            sent_by: user,
            recipient: &recipient,
            delivered: sent.is_ok(),
            detail: sent.as_ref().err().map(|e| e.to_string()),
        },
    )
    .await?;

    sent?;

    Ok(EmailCarePlanResponse {
        notification_id,
        message: format!("Care plan sent to {}", recipient),
        recipient,
        file_name: rendered.file_name,
    })
}
