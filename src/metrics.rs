use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and query activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    fragments_extracted: AtomicU64,
    embeddings_failed: AtomicU64,
    queries_answered: AtomicU64,
    generation_failures: AtomicU64,
    last_index_size: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a published document session.
    pub fn record_document(&self, fragment_count: u64, failed_embeddings: u64, index_size: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.fragments_extracted
            .fetch_add(fragment_count, Ordering::Relaxed);
        self.embeddings_failed
            .fetch_add(failed_embeddings, Ordering::Relaxed);
        self.last_index_size.store(index_size, Ordering::Relaxed);
    }

    /// Record an answered query and whether generation degraded.
    pub fn record_query(&self, generation_failed: bool) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
        if generation_failed {
            self.generation_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents_processed = self.documents_processed.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_processed,
            fragments_extracted: self.fragments_extracted.load(Ordering::Relaxed),
            embeddings_failed: self.embeddings_failed.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            last_index_size: (documents_processed > 0)
                .then(|| self.last_index_size.load(Ordering::Relaxed)),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_processed: u64,
    /// Total fragments produced across all ingested documents.
    pub fragments_extracted: u64,
    /// Fragments whose embedding could not be produced.
    pub embeddings_failed: u64,
    /// Questions answered (including degraded answers).
    pub queries_answered: u64,
    /// Answers that fell back to the error placeholder.
    pub generation_failures: u64,
    /// Vector count of the most recently published index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_index_size: Option<u64>,
}
