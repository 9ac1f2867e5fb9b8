//! The published result of one successful ingestion and its swap point.

use super::index::{ExactIndex, VectorIndex};
use super::types::Fragment;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Immutable fragments plus the index built over them.
#[derive(Debug)]
pub struct DocumentSession {
    /// Content-addressed identifier of the source document.
    pub document_id: String,
    /// Path the document was ingested from.
    pub source_path: PathBuf,
    /// RFC 3339 timestamp of publication.
    pub ingested_at: String,
    /// Every extracted fragment, embedded or not, in extraction order.
    pub fragments: Vec<Fragment>,
    /// Index over the fragments that carry an embedding.
    pub index: ExactIndex,
}

impl DocumentSession {
    /// Number of searchable vectors.
    pub fn indexed(&self) -> usize {
        self.index.len()
    }
}

/// Holder of the current session.
///
/// Readers clone the `Arc` and release the lock immediately, so a query never observes a
/// partially built session. Ingestions serialize on a separate gate.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Option<Arc<DocumentSession>>>,
    ingest_gate: Mutex<()>,
}

impl SessionSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently published session, if any.
    pub async fn current(&self) -> Option<Arc<DocumentSession>> {
        self.current.read().await.clone()
    }

    /// Replace the published session wholesale.
    pub async fn publish(&self, session: DocumentSession) -> Arc<DocumentSession> {
        let session = Arc::new(session);
        *self.current.write().await = Some(Arc::clone(&session));
        session
    }

    /// Exclusive ingestion permit; hold it from extraction until publication.
    pub async fn begin_ingest(&self) -> MutexGuard<'_, ()> {
        self.ingest_gate.lock().await
    }
}
