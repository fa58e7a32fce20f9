//! External collaborators
//!
//! Each collaborator sits behind a trait so handlers can be exercised
//! against test doubles:
//!
//! - [`PredictionService`]: readmission class and probability for one record
//! - [`NarrativeService`]: free-text care plan from a patient summary
//! - [`SpeechService`]: audio for a plain-text plan
//! - [`DocumentRenderer`]: paginated PDF rendering of a plan
//! - [`MailDispatcher`]: delivers a rendered plan to a recipient

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::care_plan::Language;
use crate::config::ServicesConfig;
use crate::patient::PatientSummary;

pub mod document;
pub mod mail;
pub mod narrative;
pub mod prediction;
pub mod speech;

pub use document::{CarePlanDocument, PdfDocumentRenderer, RenderedDocument};
pub use mail::{Attachment, HttpMailDispatcher, OutgoingMail};
pub use narrative::GeminiNarrativeService;
pub use prediction::HttpPredictionService;
pub use speech::HttpSpeechService;

/// Longest upstream body quoted back in an error
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unusable response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} could not render the document: {reason}")]
    Render {
        service: &'static str,
        reason: String,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ServiceError {
    pub(crate) fn http(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ServiceError::Http { service, source }
    }

    pub(crate) fn invalid(service: &'static str, reason: impl ToString) -> Self {
        ServiceError::InvalidResponse {
            service,
            reason: reason.to_string(),
        }
    }
}

/// Readmission prediction for one patient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when readmission within 30 days is predicted
    pub predicted_class: i32,
    /// Probability of readmission, in percent
    pub probability: f64,
}

impl Prediction {
    pub fn validate(self, service: &'static str) -> Result<Self, ServiceError> {
        if !(0..=1).contains(&self.predicted_class) {
            return Err(ServiceError::invalid(
                service,
                format!("predicted class {} is not 0 or 1", self.predicted_class),
            ));
        }
        if !self.probability.is_finite() || !(0.0..=100.0).contains(&self.probability) {
            return Err(ServiceError::invalid(
                service,
                format!("probability {} is outside 0..=100", self.probability),
            ));
        }
        Ok(self)
    }
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    /// `features` uses the model's column names
    async fn predict(&self, features: &Map<String, JsonValue>) -> Result<Prediction, ServiceError>;
}

#[async_trait]
pub trait NarrativeService: Send + Sync {
    /// Raw narrative text; callers extract the plan from it
    async fn generate(
        &self,
        patient: &PatientSummary,
        language: Language,
    ) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    /// MP3 audio of `text` spoken in `language`
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, ServiceError>;
}

pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &CarePlanDocument) -> Result<RenderedDocument, ServiceError>;
}

#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ServiceError>;
}

/// All collaborators, as shared by the handlers
#[derive(Clone)]
pub struct Services {
    pub prediction: Arc<dyn PredictionService>,
    pub narrative: Arc<dyn NarrativeService>,
    pub speech: Arc<dyn SpeechService>,
    pub documents: Arc<dyn DocumentRenderer>,
    pub mail: Arc<dyn MailDispatcher>,
}

impl Services {
    /// HTTP-backed collaborators sharing one client
    pub fn from_config(config: &ServicesConfig) -> Result<Self, ServiceError> {
        let client = http_client(config.timeout_secs)?;

        Ok(Self {
            prediction: Arc::new(HttpPredictionService::new(
                client.clone(),
                &config.prediction_url,
            )),
            narrative: Arc::new(GeminiNarrativeService::new(
                client.clone(),
                &config.llm_api_url,
                &config.llm_model,
                config.llm_api_key.clone(),
            )),
            speech: Arc::new(HttpSpeechService::new(client.clone(), &config.tts_url)),
            documents: Arc::new(PdfDocumentRenderer::default()),
            mail: Arc::new(HttpMailDispatcher::new(
                client,
                &config.mail_api_url,
                config.mail_api_key.clone(),
                &config.mail_sender,
            )),
        })
    }
}

pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("readmit-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ServiceError::http("http client"))
}

/// Turn a non-2xx response into [`ServiceError::Status`]
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        service,
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_validation() {
        let ok = Prediction {
            predicted_class: 1,
            probability: 72.5,
        };
        assert!(ok.validate("prediction").is_ok());

        let bad_class = Prediction {
            predicted_class: 2,
            probability: 10.0,
        };
        assert!(bad_class.validate("prediction").is_err());

        let bad_probability = Prediction {
            predicted_class: 0,
            probability: 140.0,
        };
        let err = bad_probability.validate("prediction").unwrap_err();
        assert!(err.to_string().contains("outside 0..=100"));

        let nan = Prediction {
            predicted_class: 0,
            probability: f64::NAN,
        };
        assert!(nan.validate("prediction").is_err());
    }

    #[test]
    fn test_services_from_default_config() {
        assert!(Services::from_config(&ServicesConfig::default()).is_ok());
    }
}
