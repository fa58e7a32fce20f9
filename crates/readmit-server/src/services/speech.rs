//! Text-to-speech client

use async_trait::async_trait;
use serde::Serialize;

use super::{check_status, ServiceError, SpeechService};
use crate::care_plan::Language;

const SERVICE: &str = "speech service";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    lang: &'static str,
}

/// Posts text and a language code, receives MP3 bytes
pub struct HttpSpeechService {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechService {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    #[tracing::instrument(skip(self, text), fields(chars = text.len(), lang = language.code()))]
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SpeechRequest {
                text,
                lang: language.code(),
            })
            .send()
            .await
            .map_err(ServiceError::http(SERVICE))?;

        let audio = check_status(SERVICE, response)
            .await?
            .bytes()
            .await
            .map_err(ServiceError::http(SERVICE))?;

        if audio.is_empty() {
            return Err(ServiceError::invalid(SERVICE, "empty audio"));
        }

        Ok(audio.to_vec())
    }
}
