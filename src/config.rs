use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Scanned PDFs routinely exceed axum's 2 MiB default body limit.
const DEFAULT_UPLOAD_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the scanrag server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Embedding provider used for fragments and questions alike.
    pub embedding_provider: EmbeddingProvider,
    /// Endpoint of the multimodal embedding service (required for `http`).
    pub embedding_url: Option<String>,
    /// Optional bearer token sent to the embedding service.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum number of embedding requests in flight during ingestion.
    pub embedding_concurrency: usize,
    /// Generative backend used to compose answers.
    pub generation_provider: GenerationProvider,
    /// Base URL or endpoint of the generative service.
    pub generation_url: Option<String>,
    /// Optional bearer token sent to the generative service.
    pub generation_api_key: Option<String>,
    /// Generative model identifier.
    pub generation_model: String,
    /// Upper bound on generated tokens per answer.
    pub generation_max_tokens: u32,
    /// Target chunk size, measured in `text_splitter_unit`.
    pub text_splitter_chunk_size: usize,
    /// Overlap carried from one chunk into the next.
    pub text_splitter_chunk_overlap: usize,
    /// Unit used to measure chunk sizes.
    pub text_splitter_unit: ChunkUnit,
    /// Number of fragments retrieved per question.
    pub retrieval_top_k: usize,
    /// Root directory for persisted fragment payloads.
    pub storage_dir: PathBuf,
    /// Directory receiving uploaded documents.
    pub upload_dir: PathBuf,
    /// Largest accepted upload body, in bytes.
    pub upload_max_bytes: usize,
    /// Tesseract language pack used for recognition.
    pub ocr_language: String,
    /// Resolution used when rasterizing pages.
    pub render_dpi: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote multimodal embedding endpoint speaking the Titan JSON format.
    Http,
    /// Deterministic local hashing embedder.
    Hashing,
}

/// Supported answer generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Local Ollama runtime with a vision-capable model.
    Ollama,
    /// Remote endpoint accepting the Nova native converse body.
    Converse,
    /// No generator configured; answers degrade to a placeholder.
    None,
}

/// Unit in which chunk sizes and overlaps are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Unicode scalar values.
    Chars,
    /// cl100k BPE tokens.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            embedding_provider: load_parsed_or("EMBEDDING_PROVIDER", EmbeddingProvider::Hashing)?,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "amazon.titan-embed-image-v1".to_string()),
            embedding_dimension: load_parsed_or("EMBEDDING_DIMENSION", 384)?,
            embedding_concurrency: load_parsed_or("EMBEDDING_CONCURRENCY", 4)?,
            generation_provider: load_parsed_or("GENERATION_PROVIDER", GenerationProvider::None)?,
            generation_url: load_env_optional("GENERATION_URL"),
            generation_api_key: load_env_optional("GENERATION_API_KEY"),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| "amazon.nova-pro-v1:0".to_string()),
            generation_max_tokens: load_parsed_or("GENERATION_MAX_TOKENS", 300)?,
            text_splitter_chunk_size: load_parsed_or("TEXT_SPLITTER_CHUNK_SIZE", 700)?,
            text_splitter_chunk_overlap: load_parsed_or("TEXT_SPLITTER_CHUNK_OVERLAP", 200)?,
            text_splitter_unit: load_parsed_or("TEXT_SPLITTER_UNIT", ChunkUnit::Chars)?,
            retrieval_top_k: load_parsed_or("RETRIEVAL_TOP_K", 5)?,
            storage_dir: load_env_optional("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            upload_dir: load_env_optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            upload_max_bytes: load_parsed_or("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?,
            ocr_language: load_env_optional("OCR_LANGUAGE").unwrap_or_else(|| "eng".to_string()),
            render_dpi: load_parsed_or("RENDER_DPI", 200)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.embedding_concurrency == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_CONCURRENCY".into()));
        }
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        if self.upload_max_bytes == 0 {
            return Err(ConfigError::InvalidValue("UPLOAD_MAX_BYTES".into()));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if self.embedding_provider == EmbeddingProvider::Http && self.embedding_url.is_none() {
            return Err(ConfigError::MissingVariable("EMBEDDING_URL".into()));
        }
        if self.generation_provider == GenerationProvider::Converse
            && self.generation_url.is_none()
        {
            return Err(ConfigError::MissingVariable("GENERATION_URL".into()));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "titan" => Ok(Self::Http),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "converse" | "nova" => Ok(Self::Converse),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

impl FromStr for ChunkUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        embedding_provider = ?config.embedding_provider,
        embedding_dimension = config.embedding_dimension,
        generation_provider = ?config.generation_provider,
        storage_dir = %config.storage_dir.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    let _ = CONFIG.set(config);
}
