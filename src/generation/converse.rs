//! Adapter for endpoints accepting the Nova native request body.

use super::{ContentBlock, GenerationClient, GenerationClientError, GenerationRequest};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

/// Generation client posting `system`/`messages`/`inferenceConfig` bodies.
pub struct ConverseGenerationClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ConverseGenerationClient {
    /// Create a client for the given endpoint.
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("scanrag/generate")
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint,
            api_key,
        }
    }

    fn payload(request: &GenerationRequest<'_>) -> Value {
        let context: Vec<Value> = request
            .context
            .iter()
            .map(|block| match block {
                ContentBlock::Text(text) => json!({ "text": text }),
                ContentBlock::Image { format, data } => json!({
                    "image": {
                        "format": format.as_str(),
                        "source": { "bytes": BASE64.encode(data) },
                    }
                }),
            })
            .collect();

        json!({
            "system": [{ "text": request.system }],
            "messages": [
                { "role": "user", "content": context },
                { "role": "user", "content": [{ "text": request.question }] },
            ],
            "inferenceConfig": {
                "max_new_tokens": request.inference.max_tokens,
                "top_p": request.inference.top_p,
                "top_k": request.inference.top_k,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseMessage {
    content: Vec<ConverseContent>,
}

#[derive(Debug, Deserialize)]
struct ConverseContent {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationClient for ConverseGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<String, GenerationClientError> {
        let mut builder = self.http.post(&self.endpoint).json(&Self::payload(request));
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|error| {
            GenerationClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.endpoint
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: ConverseResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        let text: Vec<String> = body
            .output
            .message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(GenerationClientError::InvalidResponse(
                "response carried no text content".into(),
            ));
        }
        Ok(text.join("\n"))
    }

    fn name(&self) -> &str {
        "converse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::InferenceSettings;
    use crate::processing::types::ImageFormat;
    use httpmock::{Method::POST, MockServer};

    #[test]
    fn payload_keeps_rank_order_and_separates_question() {
        let request = GenerationRequest {
            system: "sys",
            context: vec![
                ContentBlock::Image {
                    format: ImageFormat::Png,
                    data: &[255],
                },
                ContentBlock::Text("second"),
            ],
            question: "q?",
            inference: InferenceSettings::default(),
        };

        let payload = ConverseGenerationClient::payload(&request);

        assert_eq!(payload["system"][0]["text"], "sys");
        let context = &payload["messages"][0]["content"];
        assert_eq!(context[0]["image"]["format"], "png");
        assert_eq!(context[0]["image"]["source"]["bytes"], "/w==");
        assert_eq!(context[1]["text"], "second");
        assert_eq!(payload["messages"][1]["content"][0]["text"], "q?");
        assert_eq!(payload["inferenceConfig"]["max_new_tokens"], 300);
        assert_eq!(payload["inferenceConfig"]["top_k"], 20);
    }

    #[tokio::test]
    async fn converse_client_joins_text_blocks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/invoke");
                then.status(200).json_body(json!({
                    "output": { "message": { "role": "assistant", "content": [
                        { "text": "Page 2 shows" },
                        { "text": "the signature." }
                    ] } }
                }));
            })
            .await;

        let client = ConverseGenerationClient::new(format!("{}/invoke", server.base_url()), None);
        let request = GenerationRequest {
            system: "sys",
            context: Vec::new(),
            question: "where is the signature?",
            inference: InferenceSettings::default(),
        };
        let answer = client.generate(&request).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "Page 2 shows\nthe signature.");
    }
}
