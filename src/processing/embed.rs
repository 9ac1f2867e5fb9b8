//! Attaching embeddings to extracted fragments.
//!
//! Each fragment is embedded independently with bounded concurrency. Results are merged back by
//! fragment position, so completion order never affects which vector lands on which fragment.

use super::types::{Fragment, FragmentContent};
use crate::embedding::{EmbeddingClient, EmbeddingInput};
use futures_util::stream::{self, StreamExt};

/// Outcome counts of one embedding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingReport {
    /// Fragments submitted to the provider.
    pub attempted: usize,
    /// Fragments that received a vector of the expected dimension.
    pub embedded: usize,
    /// Provider calls that failed.
    pub failed: usize,
    /// Vectors discarded because their length differed from the configured dimension.
    pub rejected: usize,
}

impl EmbeddingReport {
    /// Fragments left without an embedding.
    pub fn missing(&self) -> usize {
        self.failed + self.rejected
    }
}

/// Populate `embedding` on every fragment the provider can handle.
///
/// Provider failures are logged and leave the fragment without an embedding.
pub async fn embed_fragments(
    client: &dyn EmbeddingClient,
    fragments: &mut [Fragment],
    dimension: usize,
    concurrency: usize,
) -> EmbeddingReport {
    let mut report = EmbeddingReport {
        attempted: fragments.len(),
        ..EmbeddingReport::default()
    };
    if fragments.is_empty() {
        return report;
    }

    let requests: Vec<_> = fragments
        .iter()
        .enumerate()
        .map(|(position, fragment)| async move {
            let input = match &fragment.content {
                FragmentContent::Text(text) => EmbeddingInput::Text(text),
                FragmentContent::PageImage(image) => EmbeddingInput::Image(&image.data),
            };
            (position, client.embed(input, dimension).await)
        })
        .collect();
    let results: Vec<_> = stream::iter(requests)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (position, result) in results {
        let fragment = &mut fragments[position];
        match result {
            Ok(vector) if vector.len() == dimension => {
                fragment.embedding = Some(vector);
                report.embedded += 1;
            }
            Ok(vector) => {
                tracing::warn!(
                    page = fragment.page(),
                    modality = fragment.modality().as_str(),
                    expected = dimension,
                    actual = vector.len(),
                    "Discarding embedding with unexpected dimension"
                );
                fragment.embedding = None;
                report.rejected += 1;
            }
            Err(error) => {
                tracing::warn!(
                    page = fragment.page(),
                    modality = fragment.modality().as_str(),
                    provider = client.name(),
                    error = %error,
                    "Embedding failed; fragment excluded from index"
                );
                fragment.embedding = None;
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::processing::types::{ImageFormat, PageImage};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Echoes the first byte of each input into every slot, with a delay inversely related to
    /// it so that completion order differs from submission order.
    struct EchoClient;

    #[async_trait]
    impl EmbeddingClient for EchoClient {
        async fn embed(
            &self,
            input: EmbeddingInput<'_>,
            dimension: usize,
        ) -> Result<Vec<f32>, EmbeddingClientError> {
            let first = match input {
                EmbeddingInput::Text(text) => *text.as_bytes().first().unwrap_or(&0),
                EmbeddingInput::Image(bytes) => *bytes.first().unwrap_or(&0),
            };
            if first == b'!' {
                return Err(EmbeddingClientError::GenerationFailed("refused".into()));
            }
            if first == b'?' {
                return Ok(vec![0.0; dimension + 1]);
            }
            tokio::time::sleep(Duration::from_millis(u64::from(255 - first) / 16)).await;
            Ok(vec![f32::from(first); dimension])
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn text(page: usize, value: &str) -> Fragment {
        Fragment::text(page, value.to_string(), PathBuf::from("t"))
    }

    #[tokio::test]
    async fn vectors_follow_fragment_identity() {
        let mut fragments = vec![
            text(0, "a"),
            text(0, "z"),
            Fragment::page_image(
                0,
                PageImage {
                    format: ImageFormat::Png,
                    data: vec![7],
                },
                PathBuf::from("i"),
            ),
            text(1, "m"),
        ];

        let report = embed_fragments(&EchoClient, &mut fragments, 3, 4).await;

        assert_eq!(report.embedded, 4);
        let firsts: Vec<f32> = fragments
            .iter()
            .map(|fragment| fragment.embedding.as_ref().expect("embedded")[0])
            .collect();
        assert_eq!(firsts, vec![97.0, 122.0, 7.0, 109.0]);
    }

    #[tokio::test]
    async fn failures_and_wrong_dimensions_are_absorbed() {
        let mut fragments = vec![text(0, "!nope"), text(0, "?odd"), text(0, "ok")];

        let report = embed_fragments(&EchoClient, &mut fragments, 2, 2).await;

        assert_eq!(
            report,
            EmbeddingReport {
                attempted: 3,
                embedded: 1,
                failed: 1,
                rejected: 1,
            }
        );
        assert!(fragments[0].embedding.is_none());
        assert!(fragments[1].embedding.is_none());
        assert_eq!(fragments[2].embedding.as_ref().map(Vec::len), Some(2));
    }
}
