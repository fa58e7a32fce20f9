//! Narrative generation through a Gemini-style `generateContent` API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, NarrativeService, ServiceError};
use crate::care_plan::{prompt, Language};
use crate::patient::PatientSummary;

const SERVICE: &str = "narrative service";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiNarrativeService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiNarrativeService {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl NarrativeService for GeminiNarrativeService {
    #[tracing::instrument(skip(self, patient, language), fields(model = %self.model, language = %language))]
    async fn generate(
        &self,
        patient: &PatientSummary,
        language: Language,
    ) -> Result<String, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("LLM_API_KEY"))?;

        let prompt = prompt(patient, language);
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(ServiceError::http(SERVICE))?;

        let body: GenerateResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ServiceError::invalid(SERVICE, "no text in the first candidate"));
        }

        tracing::debug!(chars = text.len(), "narrative generated");
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::patient::RiskCategory;
    use crate::services::http_client;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn summary() -> PatientSummary {
        PatientSummary {
            subject_id: Some(1),
            age: Some(80),
            diagnosis: Some("CHF".to_string()),
            risk_category: RiskCategory::High,
        }
    }

    #[tokio::test]
    async fn test_generate_joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "```json\n{\"tips\": "}, {"text": "[\"Rest\"]}\n```"}]}}]
            })))
            .mount(&server)
            .await;

        let service = GeminiNarrativeService::new(
            http_client(5).unwrap(),
            &format!("{}/v1beta/", server.uri()),
            "models/gemini-test",
            Some("key-123".to_string()),
        );
        let text = service.generate(&summary(), Language::Hindi).await.unwrap();

        let plan = crate::care_plan::extract_care_plan(&text);
        assert_eq!(plan.tips, vec!["Rest"]);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let service =
            GeminiNarrativeService::new(http_client(5).unwrap(), "http://127.0.0.1:9", "m", None);
        let err = service.generate(&summary(), Language::English).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured("LLM_API_KEY")));
    }

    #[tokio::test]
    async fn test_empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let service = GeminiNarrativeService::new(
            http_client(5).unwrap(),
            &server.uri(),
            "m",
            Some("k".to_string()),
        );
        let err = service.generate(&summary(), Language::English).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }
}
