//! Question embedding and nearest-fragment lookup.

use super::index::VectorIndex;
use super::session::DocumentSession;
use super::types::{QueryError, RetrievedFragment};
use crate::embedding::{EmbeddingClient, EmbeddingClientError, EmbeddingInput};

/// Resolves a question to ranked fragments of the published session.
pub struct RetrievalEngine<'a> {
    client: &'a dyn EmbeddingClient,
    dimension: usize,
    top_k: usize,
}

impl<'a> RetrievalEngine<'a> {
    /// Use `client` (the same one that embedded the fragments) and return up to `top_k` hits.
    pub fn new(client: &'a dyn EmbeddingClient, dimension: usize, top_k: usize) -> Self {
        Self {
            client,
            dimension,
            top_k,
        }
    }

    /// Rank the session's fragments against `question`.
    pub async fn retrieve(
        &self,
        session: Option<&DocumentSession>,
        question: &str,
    ) -> Result<Vec<RetrievedFragment>, QueryError> {
        let session = session
            .filter(|session| session.index.is_available())
            .ok_or(QueryError::IndexUnavailable)?;

        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let vector = self
            .client
            .embed(EmbeddingInput::Text(question), self.dimension)
            .await?;
        if vector.len() != self.dimension {
            return Err(QueryError::QueryEmbedding(
                EmbeddingClientError::InvalidResponse(format!(
                    "query vector has {} dimensions, expected {}",
                    vector.len(),
                    self.dimension
                )),
            ));
        }

        let hits = session.index.search(&vector, self.top_k)?;
        let mut retrieved = Vec::with_capacity(hits.len());
        for (rank, hit) in hits.into_iter().enumerate() {
            let Some(fragment) = session.fragments.get(hit.fragment) else {
                tracing::error!(
                    position = hit.fragment,
                    fragments = session.fragments.len(),
                    "Index hit points past the fragment list"
                );
                continue;
            };
            retrieved.push(RetrievedFragment {
                rank,
                distance: hit.distance,
                provenance: fragment.provenance.clone(),
                content: fragment.content.clone(),
            });
        }

        tracing::debug!(
            document_id = %session.document_id,
            requested = self.top_k,
            returned = retrieved.len(),
            "Retrieved fragments"
        );
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::index::ExactIndex;
    use crate::processing::types::{Fragment, ImageFormat, Modality, PageImage};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed vector and counts calls.
    struct FixedClient {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl FixedClient {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for FixedClient {
        async fn embed(
            &self,
            _input: EmbeddingInput<'_>,
            _dimension: usize,
        ) -> Result<Vec<f32>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn session() -> DocumentSession {
        let unembedded = Fragment::text(0, "skipped".into(), PathBuf::from("t0"));
        let mut near = Fragment::text(0, "near".into(), PathBuf::from("t1"));
        near.embedding = Some(vec![1.0, 0.0]);
        let mut image = Fragment::page_image(
            0,
            PageImage {
                format: ImageFormat::Png,
                data: vec![1, 2, 3],
            },
            PathBuf::from("p0"),
        );
        image.embedding = Some(vec![0.0, 1.0]);
        let fragments = vec![unembedded, near, image];
        let index = ExactIndex::build(&fragments, 2);

        DocumentSession {
            document_id: "doc".into(),
            source_path: PathBuf::from("doc.pdf"),
            ingested_at: "2024-01-01T00:00:00Z".into(),
            fragments,
            index,
        }
    }

    #[tokio::test]
    async fn hits_resolve_to_fragments_in_rank_order() {
        let client = FixedClient::new(vec![0.9, 0.1]);
        let engine = RetrievalEngine::new(&client, 2, 5);
        let session = session();

        let retrieved = engine
            .retrieve(Some(&session), "  where?  ")
            .await
            .expect("retrieve");

        assert_eq!(retrieved.len(), 2);
        assert_eq!(retrieved[0].rank, 0);
        assert_eq!(retrieved[0].provenance.storage_path, PathBuf::from("t1"));
        assert_eq!(retrieved[1].source().modality, Modality::PageImage);
        assert!(retrieved[0].distance <= retrieved[1].distance);
    }

    #[tokio::test]
    async fn missing_session_fails_before_embedding() {
        let client = FixedClient::new(vec![1.0, 0.0]);
        let engine = RetrievalEngine::new(&client, 2, 5);

        let error = engine.retrieve(None, "").await.expect_err("no session");

        assert!(matches!(error, QueryError::IndexUnavailable));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_provider_call() {
        let client = FixedClient::new(vec![1.0, 0.0]);
        let engine = RetrievalEngine::new(&client, 2, 5);
        let session = session();

        let error = engine
            .retrieve(Some(&session), " \n")
            .await
            .expect_err("blank");

        assert!(matches!(error, QueryError::EmptyQuestion));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_length_query_vector_is_fatal() {
        let client = FixedClient::new(vec![1.0, 0.0, 0.0]);
        let engine = RetrievalEngine::new(&client, 2, 5);
        let session = session();

        let error = engine
            .retrieve(Some(&session), "question")
            .await
            .expect_err("dimension");

        assert!(matches!(
            error,
            QueryError::QueryEmbedding(EmbeddingClientError::InvalidResponse(_))
        ));
    }
}
