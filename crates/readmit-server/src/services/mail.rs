//! Outgoing mail through an HTTP mail API

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use super::{check_status, MailDispatcher, ServiceError};

const SERVICE: &str = "mail service";

pub const CARE_PLAN_SUBJECT: &str = "Your Hospital Care Report";

pub const CARE_PLAN_BODY: &str = "Dear Patient,\n\n\
    Please find attached your hospital discharge report.\n\n\
    Stay healthy,\n\
    Your Hospital Team";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    attachments: Vec<AttachmentPayload<'a>>,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    content_type: &'a str,
    /// Base64-encoded content
    content: String,
}

pub struct HttpMailDispatcher {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    sender: String,
}

impl HttpMailDispatcher {
    pub fn new(client: reqwest::Client, url: &str, api_key: Option<String>, sender: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl MailDispatcher for HttpMailDispatcher {
    #[tracing::instrument(skip(self, mail), fields(recipient = %mail.recipient))]
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ServiceError> {
        let request = SendRequest {
            from: &self.sender,
            to: [&mail.recipient],
            subject: &mail.subject,
            text: &mail.body,
            attachments: mail
                .attachment
                .iter()
                .map(|a| AttachmentPayload {
                    filename: &a.file_name,
                    content_type: &a.content_type,
                    content: STANDARD.encode(&a.bytes),
                })
                .collect(),
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(ServiceError::http(SERVICE))?;
        check_status(SERVICE, response).await?;

        tracing::info!("mail accepted for delivery");
        Ok(())
    }
}
