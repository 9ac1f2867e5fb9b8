//! Grounded answer composition from ranked fragments.

use super::types::{FragmentContent, RetrievedFragment};
use crate::generation::{ContentBlock, GenerationClient, GenerationRequest, InferenceSettings};

/// Fixed instruction sent with every generation request.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant. Use the provided text and images to answer questions.";

/// Text produced by the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAnswer {
    /// Generated text, or `Error: <reason>` when generation failed.
    pub text: String,
    /// Whether `text` is a failure placeholder.
    pub degraded: bool,
}

/// Builds one multimodal request per question and invokes the generator once.
pub struct AnswerComposer<'a> {
    client: &'a dyn GenerationClient,
    inference: InferenceSettings,
}

impl<'a> AnswerComposer<'a> {
    /// Compose with `client` under the given sampling limits.
    pub fn new(client: &'a dyn GenerationClient, inference: InferenceSettings) -> Self {
        Self { client, inference }
    }

    /// Ask the generator to answer `question` from `fragments`, kept in rank order.
    ///
    /// Generation failures are folded into the returned text instead of being propagated.
    pub async fn compose(&self, question: &str, fragments: &[RetrievedFragment]) -> ComposedAnswer {
        let context = fragments
            .iter()
            .map(|fragment| match &fragment.content {
                FragmentContent::Text(text) => ContentBlock::Text(text),
                FragmentContent::PageImage(image) => ContentBlock::Image {
                    format: image.format,
                    data: &image.data,
                },
            })
            .collect();
        let request = GenerationRequest {
            system: SYSTEM_INSTRUCTION,
            context,
            question,
            inference: self.inference,
        };

        match self.client.generate(&request).await {
            Ok(text) => ComposedAnswer {
                text,
                degraded: false,
            },
            Err(error) => {
                tracing::warn!(
                    provider = self.client.name(),
                    error = %error,
                    "Answer generation failed"
                );
                ComposedAnswer {
                    text: format!("Error: {error}"),
                    degraded: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{DisabledGenerationClient, GenerationClientError};
    use crate::processing::types::{ImageFormat, PageImage, Provenance};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationClient for RecordingClient {
        async fn generate(
            &self,
            request: &GenerationRequest<'_>,
        ) -> Result<String, GenerationClientError> {
            let mut seen = self.seen.lock().expect("lock");
            seen.push(request.system.to_string());
            for block in &request.context {
                seen.push(match block {
                    ContentBlock::Text(text) => format!("text:{text}"),
                    ContentBlock::Image { format, data } => {
                        format!("image:{}:{}", format.as_str(), data.len())
                    }
                });
            }
            seen.push(format!("question:{}", request.question));
            Ok("grounded answer".into())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn retrieved(rank: usize, content: FragmentContent) -> RetrievedFragment {
        RetrievedFragment {
            rank,
            distance: rank as f32,
            provenance: Provenance {
                page: 0,
                storage_path: PathBuf::from("p"),
            },
            content,
        }
    }

    #[tokio::test]
    async fn request_keeps_rank_order_and_question_last() {
        let client = RecordingClient::default();
        let composer = AnswerComposer::new(&client, InferenceSettings::default());
        let fragments = vec![
            retrieved(
                0,
                FragmentContent::PageImage(PageImage {
                    format: ImageFormat::Png,
                    data: vec![0; 5],
                }),
            ),
            retrieved(1, FragmentContent::Text("Invoice 42".into())),
        ];

        let answer = composer.compose("Which invoice?", &fragments).await;

        assert_eq!(answer.text, "grounded answer");
        assert!(!answer.degraded);
        let seen = client.seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                SYSTEM_INSTRUCTION.to_string(),
                "image:png:5".to_string(),
                "text:Invoice 42".to_string(),
                "question:Which invoice?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn generation_failure_becomes_placeholder() {
        let composer = AnswerComposer::new(&DisabledGenerationClient, InferenceSettings::default());

        let answer = composer.compose("anything", &[]).await;

        assert!(answer.degraded);
        assert!(answer.text.starts_with("Error: "));
        assert!(answer.text.len() > "Error: ".len());
    }
}
