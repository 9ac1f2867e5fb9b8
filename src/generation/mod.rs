//! Generative capability used to compose grounded answers.
//!
//! A request carries a system instruction, the retrieved context as ordered content blocks (text
//! inline, page images as attachments) and the literal question. Adapters translate it into their
//! provider's wire format and return the generated text verbatim.

use crate::config::{Config, GenerationProvider};
use crate::processing::types::ImageFormat;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

mod converse;
mod ollama;

pub use converse::ConverseGenerationClient;
pub use ollama::OllamaGenerationClient;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// One block of retrieved context.
#[derive(Debug, Clone, Copy)]
pub enum ContentBlock<'a> {
    /// Literal text of a chunk.
    Text(&'a str),
    /// Encoded page image.
    Image {
        /// Raster encoding of `data`.
        format: ImageFormat,
        /// Encoded image bytes.
        data: &'a [u8],
    },
}

/// Sampling limits forwarded to the provider.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InferenceSettings {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            top_p: 0.9,
            top_k: 20,
        }
    }
}

/// Fully assembled multimodal prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    /// Fixed system instruction.
    pub system: &'a str,
    /// Retrieved fragments in rank order.
    pub context: Vec<ContentBlock<'a>>,
    /// The user's question, sent as its own message.
    pub question: &'a str,
    /// Sampling limits.
    pub inference: InferenceSettings,
}

/// Interface implemented by generative providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate an answer for the assembled request.
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<String, GenerationClientError>;

    /// Provider name for logs and health payloads.
    fn name(&self) -> &str;
}

/// Placeholder used when no generator is configured.
pub struct DisabledGenerationClient;

#[async_trait]
impl GenerationClient for DisabledGenerationClient {
    async fn generate(
        &self,
        _request: &GenerationRequest<'_>,
    ) -> Result<String, GenerationClientError> {
        Err(GenerationClientError::ProviderUnavailable(
            "no generation provider configured".into(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Build a generation client based on configuration.
pub fn get_generation_client(config: &Config) -> Box<dyn GenerationClient + Send + Sync> {
    match config.generation_provider {
        GenerationProvider::None => Box::new(DisabledGenerationClient),
        GenerationProvider::Ollama => {
            let base_url = config
                .generation_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Box::new(OllamaGenerationClient::new(
                base_url,
                config.generation_model.clone(),
            ))
        }
        GenerationProvider::Converse => Box::new(ConverseGenerationClient::new(
            config.generation_url.clone().unwrap_or_default(),
            config.generation_api_key.clone(),
        )),
    }
}
