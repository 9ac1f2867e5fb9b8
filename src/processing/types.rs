//! Core data types and error definitions for the processing pipeline.

use crate::document::RenderError;
use crate::embedding::EmbeddingClientError;
use anyhow::Error as TokenizerError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Raster encoding of a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
}

impl ImageFormat {
    /// Format tag used by providers and file extensions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

/// Fully rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Encoding of `data`.
    pub format: ImageFormat,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

/// Content modality of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// A chunk of recognized text.
    Text,
    /// A full rendered page.
    PageImage,
}

impl Modality {
    /// Stable label used in logs and payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::PageImage => "page_image",
        }
    }
}

/// Payload of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentContent {
    /// Non-empty chunk text.
    Text(String),
    /// Rendered page.
    PageImage(PageImage),
}

impl FragmentContent {
    /// Modality discriminator for this payload.
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::PageImage(_) => Modality::PageImage,
        }
    }
}

/// Where a fragment came from and where its payload was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Zero-based source page.
    pub page: usize,
    /// Persisted copy of the payload. Never used for ranking.
    pub storage_path: PathBuf,
}

/// Atomic retrievable unit produced by extraction.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Page and storage location.
    pub provenance: Provenance,
    /// Text or image payload.
    pub content: FragmentContent,
    /// Vector attached by the embedding coordinator, if one was produced.
    pub embedding: Option<Vec<f32>>,
}

impl Fragment {
    /// Create a text fragment without an embedding.
    pub fn text(page: usize, text: String, storage_path: PathBuf) -> Self {
        Self {
            provenance: Provenance { page, storage_path },
            content: FragmentContent::Text(text),
            embedding: None,
        }
    }

    /// Create a page-image fragment without an embedding.
    pub fn page_image(page: usize, image: PageImage, storage_path: PathBuf) -> Self {
        Self {
            provenance: Provenance { page, storage_path },
            content: FragmentContent::PageImage(image),
            embedding: None,
        }
    }

    /// Zero-based source page.
    pub fn page(&self) -> usize {
        self.provenance.page
    }

    /// Modality of the payload.
    pub fn modality(&self) -> Modality {
        self.content.modality()
    }

    /// Persisted payload location.
    pub fn storage_path(&self) -> &Path {
        &self.provenance.storage_path
    }
}

/// A fragment resolved from a search hit, stripped of its embedding.
#[derive(Debug, Clone)]
pub struct RetrievedFragment {
    /// Zero-based rank, best match first.
    pub rank: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
    /// Page and storage location.
    pub provenance: Provenance,
    /// Text or image payload.
    pub content: FragmentContent,
}

impl RetrievedFragment {
    /// Provenance reference returned to callers.
    pub fn source(&self) -> SourceRef {
        SourceRef {
            page: self.provenance.page,
            modality: self.content.modality(),
        }
    }
}

/// Page and modality of one answer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    /// Zero-based source page.
    pub page: usize,
    /// Content modality.
    #[serde(rename = "type")]
    pub modality: Modality,
}

/// Answer returned by the query entry point.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    /// Generated answer, or a placeholder describing the generation failure.
    pub answer: String,
    /// Sources in rank order.
    pub sources: Vec<SourceRef>,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    /// Identifier of the published session.
    pub document_id: String,
    /// Number of pages rendered.
    pub page_count: usize,
    /// Number of fragments extracted (text and image).
    pub fragment_count: usize,
    /// Number of vectors in the published index.
    pub indexed: usize,
    /// Fragments that carry no embedding.
    pub missing_embeddings: usize,
}

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in each chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
    /// Tokenizer resources were unavailable.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Fatal extraction failures. Any of these aborts the ingestion.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Source document could not be read.
    #[error("Failed to open document {path}: {source}")]
    Open {
        /// Path supplied by the caller.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Page rasterization failed for the whole document.
    #[error("Failed to render document: {0}")]
    Render(#[from] RenderError),
    /// Fragment payload could not be persisted.
    #[error("Failed to persist {path}: {source}")]
    Persist {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Errors emitted by the ingestion entry point.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Extraction failed; no session was published.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunker could not be built from the configured settings.
    #[error("Invalid chunking settings: {0}")]
    Chunking(#[from] ChunkingError),
    /// Every embedding request failed; the previous session stays published.
    #[error("No embeddings could be generated for {attempted} fragments")]
    NoEmbeddings {
        /// Number of fragments submitted to the provider.
        attempted: usize,
    },
}

/// Errors raised by vector index queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Index holds no vectors.
    #[error("index is unavailable: no vectors were indexed")]
    Unavailable,
    /// Query vector length differs from the index dimension.
    #[error("query dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Index dimension.
        expected: usize,
        /// Query dimension.
        actual: usize,
    },
}

/// Errors emitted by the query entry point.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No document has been successfully ingested.
    #[error("No processed documents available; ingest a document first")]
    IndexUnavailable,
    /// Question was empty after trimming.
    #[error("Question must not be empty")]
    EmptyQuestion,
    /// The question could not be embedded.
    #[error("Failed to embed question: {0}")]
    QueryEmbedding(#[from] EmbeddingClientError),
}

impl From<IndexError> for QueryError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::Unavailable => Self::IndexUnavailable,
            IndexError::DimensionMismatch { expected, actual } => {
                Self::QueryEmbedding(EmbeddingClientError::InvalidResponse(format!(
                    "query vector has {actual} dimensions, index expects {expected}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ref_serializes_modality_as_type() {
        let source = SourceRef {
            page: 3,
            modality: Modality::PageImage,
        };
        let value = serde_json::to_value(source).expect("json");
        assert_eq!(value, serde_json::json!({ "page": 3, "type": "page_image" }));
    }

    #[test]
    fn index_unavailable_maps_to_query_precondition() {
        let error = QueryError::from(IndexError::Unavailable);
        assert!(matches!(error, QueryError::IndexUnavailable));
    }
}
