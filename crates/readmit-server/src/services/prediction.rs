//! Prediction service client

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::{check_status, Prediction, PredictionService, ServiceError};

const SERVICE: &str = "prediction service";

#[derive(Serialize)]
struct PredictRequest<'a> {
    features: &'a Map<String, JsonValue>,
}

/// Posts one record to a model-serving endpoint
pub struct HttpPredictionService {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictionService {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    #[tracing::instrument(skip(self, features), fields(url = %self.url))]
    async fn predict(&self, features: &Map<String, JsonValue>) -> Result<Prediction, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest { features })
            .send()
            .await
            .map_err(ServiceError::http(SERVICE))?;

        let prediction: Prediction = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;

        prediction.validate(SERVICE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::http_client;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn features() -> Map<String, JsonValue> {
        json!({"age": 70, "age_category": 3, "SUBJECT_ID": 9})
            .as_object()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_predict_posts_features() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(json!({"features": {"age": 70, "age_category": 3, "SUBJECT_ID": 9}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"predicted_class": 1, "probability": 81.25})),
            )
            .mount(&server)
            .await;

        let service =
            HttpPredictionService::new(http_client(5).unwrap(), &format!("{}/predict", server.uri()));
        let prediction = service.predict(&features()).await.unwrap();

        assert_eq!(
            prediction,
            Prediction {
                predicted_class: 1,
                probability: 81.25
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_probability_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"predicted_class": 0, "probability": 0.4e3})),
            )
            .mount(&server)
            .await;

        let service = HttpPredictionService::new(http_client(5).unwrap(), &server.uri());
        let err = service.predict(&features()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let service = HttpPredictionService::new(http_client(5).unwrap(), &server.uri());
        match service.predict(&features()).await.unwrap_err() {
            ServiceError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model loading");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
