//! Ollama chat adapter for vision-capable models.
//!
//! The retrieved context travels in one user message (text blocks joined in `content`, page images
//! base64-encoded in `images`), followed by a second user message holding the question.

use super::{ContentBlock, GenerationClient, GenerationClientError, GenerationRequest};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

/// Generation client backed by a local Ollama runtime.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationClient {
    /// Create a client targeting `base_url` with the given model.
    pub fn new(base_url: String, model: String) -> Self {
        let http = Client::builder()
            .user_agent("scanrag/generate")
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    fn payload(&self, request: &GenerationRequest<'_>) -> Value {
        let mut texts = Vec::new();
        let mut images = Vec::new();
        for block in &request.context {
            match block {
                ContentBlock::Text(text) => texts.push(*text),
                ContentBlock::Image { data, .. } => images.push(BASE64.encode(data)),
            }
        }

        json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": texts.join("\n\n"), "images": images },
                { "role": "user", "content": request.question },
            ],
            "options": {
                "num_predict": request.inference.max_tokens,
                "top_p": request.inference.top_p,
                "top_k": request.inference.top_k,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<String, GenerationClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
