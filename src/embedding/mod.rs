//! Embedding client abstraction and adapters.
//!
//! Fragments and questions share one client so that page images, text chunks and queries land in
//! the same vector space. Every call carries exactly one input, either text or an encoded image.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use thiserror::Error;

mod http;

pub use http::HttpEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a body we could not interpret.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Single input handed to an embedding provider.
#[derive(Debug, Clone, Copy)]
pub enum EmbeddingInput<'a> {
    /// Textual input (chunk text or a question).
    Text(&'a str),
    /// Encoded raster image (PNG bytes of a rendered page).
    Image(&'a [u8]),
}

impl EmbeddingInput<'_> {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one vector of the requested dimension for the supplied input.
    async fn embed(
        &self,
        input: EmbeddingInput<'_>,
        dimension: usize,
    ) -> Result<Vec<f32>, EmbeddingClientError>;

    /// Provider name for logs and health payloads.
    fn name(&self) -> &str;
}

/// Deterministic embedding client that hashes input bytes into vector slots.
pub struct HashingEmbeddingClient;

impl HashingEmbeddingClient {
    /// Construct a new deterministic embedding client instance.
    pub const fn new() -> Self {
        Self
    }

    fn encode(bytes: &[u8], dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if bytes.is_empty() {
            return embedding;
        }

        for (idx, byte) in bytes.iter().enumerate() {
            let position = idx % dimension;
            // Basic hashing of content into the vector slot
            embedding[position] += f32::from(*byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

impl Default for HashingEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn embed(
        &self,
        input: EmbeddingInput<'_>,
        dimension: usize,
    ) -> Result<Vec<f32>, EmbeddingClientError> {
        if dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        let bytes = match input {
            EmbeddingInput::Text(text) => text.as_bytes(),
            EmbeddingInput::Image(image) => image,
        };
        if bytes.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "empty input".to_string(),
            ));
        }

        Ok(Self::encode(bytes, dimension))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(config: &Config) -> Box<dyn EmbeddingClient + Send + Sync> {
    match config.embedding_provider {
        EmbeddingProvider::Hashing => Box::new(HashingEmbeddingClient::new()),
        EmbeddingProvider::Http => {
            let url = config.embedding_url.clone().unwrap_or_default();
            Box::new(HttpEmbeddingClient::new(
                url,
                config.embedding_model.clone(),
                config.embedding_api_key.clone(),
            ))
        }
    }
}
