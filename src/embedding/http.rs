//! HTTP embedding adapter speaking the Titan multimodal request format.
//!
//! Request: `{"inputText": "..."}` or `{"inputImage": "<base64>"}` plus
//! `{"embeddingConfig": {"outputEmbeddingLength": D}}`. Response: `{"embedding": [...]}`.

use super::{EmbeddingClient, EmbeddingClientError, EmbeddingInput};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Embedding client posting single inputs to a remote multimodal endpoint.
pub struct HttpEmbeddingClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

impl HttpEmbeddingClient {
    /// Create a client for the given endpoint.
    pub fn new(endpoint: String, model: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("scanrag/embed")
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint,
            model,
            api_key,
        }
    }

    fn request_body(input: EmbeddingInput<'_>, dimension: usize) -> Value {
        let mut body = Map::new();
        match input {
            EmbeddingInput::Text(text) => {
                body.insert("inputText".into(), Value::String(text.to_string()));
            }
            EmbeddingInput::Image(bytes) => {
                body.insert("inputImage".into(), Value::String(BASE64.encode(bytes)));
            }
        }
        body.insert(
            "embeddingConfig".into(),
            json!({ "outputEmbeddingLength": dimension }),
        );
        Value::Object(body)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(
        &self,
        input: EmbeddingInput<'_>,
        dimension: usize,
    ) -> Result<Vec<f32>, EmbeddingClientError> {
        tracing::trace!(
            model = %self.model,
            kind = input.kind(),
            dimension,
            "Requesting embedding"
        );

        let mut request = self
            .http
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(&Self::request_body(input, dimension));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.endpoint
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        body.embedding
            .ok_or_else(|| EmbeddingClientError::InvalidResponse("missing `embedding`".into()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client_for(server: &MockServer) -> HttpEmbeddingClient {
        HttpEmbeddingClient::new(
            format!("{}/embed", server.base_url()),
            "titan-test".into(),
            Some("secret".into()),
        )
    }

    #[tokio::test]
    async fn text_input_sets_only_input_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .header("authorization", "Bearer secret")
                    .json_body(json!({
                        "inputText": "hello",
                        "embeddingConfig": { "outputEmbeddingLength": 3 }
                    }));
                then.status(200)
                    .json_body(json!({ "embedding": [0.1, 0.2, 0.3] }));
            })
            .await;

        let vector = client_for(&server)
            .embed(EmbeddingInput::Text("hello"), 3)
            .await
            .expect("embedding");

        mock.assert();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn image_input_is_base64_encoded() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").json_body(json!({
                    "inputImage": "AQID",
                    "embeddingConfig": { "outputEmbeddingLength": 2 }
                }));
                then.status(200).json_body(json!({ "embedding": [1.0, 0.0] }));
            })
            .await;

        let vector = client_for(&server)
            .embed(EmbeddingInput::Image(&[1, 2, 3]), 2)
            .await
            .expect("embedding");

        mock.assert();
        assert_eq!(vector.len(), 2);
    }

    #[tokio::test]
    async fn error_status_maps_to_generation_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(429).body("throttled");
            })
            .await;

        let error = client_for(&server)
            .embed(EmbeddingInput::Text("hello"), 3)
            .await
            .expect_err("throttled");

        assert!(
            matches!(error, EmbeddingClientError::GenerationFailed(ref message) if message.contains("429"))
        );
    }

    #[tokio::test]
    async fn missing_embedding_field_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(json!({ "inputTextTokenCount": 2 }));
            })
            .await;

        let error = client_for(&server)
            .embed(EmbeddingInput::Text("hello"), 3)
            .await
            .expect_err("missing embedding");

        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }
}
