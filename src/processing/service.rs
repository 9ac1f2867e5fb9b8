//! Document service coordinating extraction, embedding, indexing and answering.

use crate::{
    config::{ChunkUnit, Config},
    document::{PageRenderer, PdftoppmRenderer, TesseractRecognizer, TextRecognizer},
    embedding::{EmbeddingClient, get_embedding_client},
    generation::{GenerationClient, InferenceSettings, get_generation_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::TextChunker,
        compose::AnswerComposer,
        embed::embed_fragments,
        extract::FragmentExtractor,
        index::{ExactIndex, VectorIndex},
        retrieval::RetrievalEngine,
        session::{DocumentSession, SessionSlot},
        storage::FragmentStore,
        types::{ProcessingError, ProcessingOutcome, QueryAnswer, QueryError},
    },
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Tunables shared by ingestion and query paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Embedding dimension requested from the provider and enforced by the index.
    pub dimension: usize,
    /// Maximum embedding requests in flight.
    pub embedding_concurrency: usize,
    /// Fragments retrieved per question.
    pub top_k: usize,
    /// Chunk size measured in `chunk_unit`.
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Unit for chunk sizes.
    pub chunk_unit: ChunkUnit,
    /// Sampling limits for answer generation.
    pub inference: InferenceSettings,
}

impl PipelineSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dimension: config.embedding_dimension,
            embedding_concurrency: config.embedding_concurrency,
            top_k: config.retrieval_top_k,
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            chunk_unit: config.text_splitter_unit,
            inference: InferenceSettings {
                max_tokens: config.generation_max_tokens,
                ..InferenceSettings::default()
            },
        }
    }
}

/// External capabilities the service is wired to.
pub struct ServiceComponents {
    /// Page rasterizer.
    pub renderer: Box<dyn PageRenderer>,
    /// Page text recognizer.
    pub recognizer: Box<dyn TextRecognizer>,
    /// Embedding provider shared by fragments and questions.
    pub embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    /// Generative provider used to compose answers.
    pub generation_client: Box<dyn GenerationClient + Send + Sync>,
    /// Durable payload storage.
    pub store: FragmentStore,
}

/// Summary of the published session for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Identifier of the ingested document.
    pub document_id: String,
    /// Path the document was read from.
    pub source_path: PathBuf,
    /// Publication timestamp (RFC 3339).
    pub ingested_at: String,
    /// Fragments extracted, embedded or not.
    pub fragments: usize,
    /// Vectors in the index.
    pub indexed: usize,
}

/// Adapter names and settings exposed to operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    /// Renderer adapter.
    pub renderer: String,
    /// Recognizer adapter.
    pub recognizer: String,
    /// Embedding provider.
    pub embedding_provider: String,
    /// Generation provider.
    pub generation_provider: String,
    /// Active pipeline settings.
    pub settings: PipelineSettings,
}

/// Owns the pipeline collaborators and the currently published document session.
///
/// Construct once near process start and share through an `Arc`; the HTTP surface and the MCP
/// tools both drive the same instance.
pub struct DocumentService {
    components: ServiceComponents,
    chunker: TextChunker,
    settings: PipelineSettings,
    sessions: SessionSlot,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, MCP).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Ingest the document at `path`, replacing the published session on success.
    async fn process_document(&self, path: &Path) -> Result<ProcessingOutcome, ProcessingError>;

    /// Answer `question` from the published session.
    async fn query(&self, question: &str) -> Result<QueryAnswer, QueryError>;

    /// Describe the published session, if any.
    async fn session_summary(&self) -> Option<SessionSummary>;

    /// Adapter names and settings.
    fn describe(&self) -> ServiceDescription;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build a service from configuration using the default adapters.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!(
            embedding_provider = ?config.embedding_provider,
            generation_provider = ?config.generation_provider,
            "Initializing document service"
        );
        let components = ServiceComponents {
            renderer: Box::new(PdftoppmRenderer::new(config.render_dpi)),
            recognizer: Box::new(TesseractRecognizer::new(config.ocr_language.clone())),
            embedding_client: get_embedding_client(config),
            generation_client: get_generation_client(config),
            store: FragmentStore::new(config.storage_dir.clone()),
        };
        Self::with_components(components, PipelineSettings::from_config(config))
    }

    /// Build a service from explicit collaborators.
    pub fn with_components(
        components: ServiceComponents,
        settings: PipelineSettings,
    ) -> Result<Self, ProcessingError> {
        let chunker = TextChunker::new(
            settings.chunk_unit,
            settings.chunk_size,
            settings.chunk_overlap,
        )?;
        Ok(Self {
            components,
            chunker,
            settings,
            sessions: SessionSlot::new(),
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Extract, embed and index a document, then publish it as the current session.
    ///
    /// The previous session stays visible until the new one is fully built. When fragments
    /// exist but none could be embedded, nothing is published and the staged payloads are
    /// dropped.
    pub async fn process_document(
        &self,
        path: &Path,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let _permit = self.sessions.begin_ingest().await;
        tracing::info!(path = %path.display(), "Processing document");

        let extractor = FragmentExtractor::new(
            self.components.renderer.as_ref(),
            self.components.recognizer.as_ref(),
            &self.chunker,
            &self.components.store,
        );
        let mut extraction = extractor.extract(path).await?;

        let report = embed_fragments(
            self.components.embedding_client.as_ref(),
            &mut extraction.fragments,
            self.settings.dimension,
            self.settings.embedding_concurrency,
        )
        .await;
        if report.attempted > 0 && report.embedded == 0 {
            extraction.storage.discard().await;
            tracing::error!(
                document_id = %extraction.document_id,
                attempted = report.attempted,
                "No fragment could be embedded; keeping previous session"
            );
            return Err(ProcessingError::NoEmbeddings {
                attempted: report.attempted,
            });
        }

        extraction.storage.commit().await?;
        let index = ExactIndex::build(&extraction.fragments, self.settings.dimension);
        let outcome = ProcessingOutcome {
            document_id: extraction.document_id.clone(),
            page_count: extraction.page_count,
            fragment_count: extraction.fragments.len(),
            indexed: index.len(),
            missing_embeddings: report.missing(),
        };

        self.sessions
            .publish(DocumentSession {
                document_id: extraction.document_id,
                source_path: path.to_path_buf(),
                ingested_at: current_timestamp_rfc3339(),
                fragments: extraction.fragments,
                index,
            })
            .await;

        self.metrics.record_document(
            outcome.fragment_count as u64,
            outcome.missing_embeddings as u64,
            outcome.indexed as u64,
        );
        tracing::info!(
            document_id = %outcome.document_id,
            pages = outcome.page_count,
            fragments = outcome.fragment_count,
            indexed = outcome.indexed,
            failed = report.failed,
            rejected = report.rejected,
            "Document indexed"
        );

        Ok(outcome)
    }

    /// Retrieve the nearest fragments for `question` and compose an answer from them.
    pub async fn query(&self, question: &str) -> Result<QueryAnswer, QueryError> {
        let session = self.sessions.current().await;
        let engine = RetrievalEngine::new(
            self.components.embedding_client.as_ref(),
            self.settings.dimension,
            self.settings.top_k,
        );
        let retrieved = engine.retrieve(session.as_deref(), question).await?;

        let composer = AnswerComposer::new(
            self.components.generation_client.as_ref(),
            self.settings.inference,
        );
        let answer = composer.compose(question.trim(), &retrieved).await;
        self.metrics.record_query(answer.degraded);

        let sources = retrieved.iter().map(|fragment| fragment.source()).collect();
        Ok(QueryAnswer {
            answer: answer.text,
            sources,
        })
    }

    /// Describe the published session, if any.
    pub async fn session_summary(&self) -> Option<SessionSummary> {
        self.sessions.current().await.map(|session| SessionSummary {
            document_id: session.document_id.clone(),
            source_path: session.source_path.clone(),
            ingested_at: session.ingested_at.clone(),
            fragments: session.fragments.len(),
            indexed: session.indexed(),
        })
    }

    /// Adapter names and settings.
    pub fn describe(&self) -> ServiceDescription {
        ServiceDescription {
            renderer: self.components.renderer.name().to_string(),
            recognizer: self.components.recognizer.name().to_string(),
            embedding_provider: self.components.embedding_client.name().to_string(),
            generation_provider: self.components.generation_client.name().to_string(),
            settings: self.settings.clone(),
        }
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for DocumentService {
    async fn process_document(&self, path: &Path) -> Result<ProcessingOutcome, ProcessingError> {
        DocumentService::process_document(self, path).await
    }

    async fn query(&self, question: &str) -> Result<QueryAnswer, QueryError> {
        DocumentService::query(self, question).await
    }

    async fn session_summary(&self) -> Option<SessionSummary> {
        DocumentService::session_summary(self).await
    }

    fn describe(&self) -> ServiceDescription {
        DocumentService::describe(self)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
