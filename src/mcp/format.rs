//! Formatting helpers shared across MCP handlers and resources.

use crate::processing::{PipelineSettings, ServiceDescription, SessionSummary};
use rmcp::model::ResourceContents;
use serde::Serialize;

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Health snapshot returned by the `health` resource.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthSnapshot {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) providers: ProvidersSnapshot,
    pub(crate) dimension: usize,
    /// Published session, absent until the first successful ingestion.
    pub(crate) session: Option<SessionSummary>,
}

/// Adapter names wired into the running service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProvidersSnapshot {
    pub(crate) renderer: String,
    pub(crate) recognizer: String,
    pub(crate) embedding: String,
    pub(crate) generation: String,
}

impl HealthSnapshot {
    pub(crate) fn new(description: ServiceDescription, session: Option<SessionSummary>) -> Self {
        Self {
            status: if session.as_ref().is_some_and(|s| s.indexed > 0) {
                "ready"
            } else {
                "awaiting-document"
            },
            version: env!("CARGO_PKG_VERSION"),
            providers: ProvidersSnapshot {
                renderer: description.renderer,
                recognizer: description.recognizer,
                embedding: description.embedding_provider,
                generation: description.generation_provider,
            },
            dimension: description.settings.dimension,
            session,
        }
    }
}

/// Settings snapshot returned by the `settings` resource.
#[derive(Debug, Serialize)]
pub(crate) struct SettingsSnapshot {
    pub(crate) pipeline: PipelineSettings,
}

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkUnit;
    use crate::generation::InferenceSettings;
    use serde_json::Value;
    use std::path::PathBuf;

    fn description() -> ServiceDescription {
        ServiceDescription {
            renderer: "pdftoppm".into(),
            recognizer: "tesseract".into(),
            embedding_provider: "hashing".into(),
            generation_provider: "none".into(),
            settings: PipelineSettings {
                dimension: 384,
                embedding_concurrency: 4,
                top_k: 5,
                chunk_size: 700,
                chunk_overlap: 200,
                chunk_unit: ChunkUnit::Chars,
                inference: InferenceSettings::default(),
            },
        }
    }

    #[test]
    fn health_reports_missing_session() {
        let body = serialize_json(&HealthSnapshot::new(description(), None), "mcp://health");
        let value: Value = serde_json::from_str(&body).expect("valid JSON");

        assert_eq!(value["status"], "awaiting-document");
        assert_eq!(value["providers"]["embedding"], "hashing");
        assert_eq!(value["dimension"], 384);
        assert!(value["session"].is_null());
    }

    #[test]
    fn health_reports_indexed_session() {
        let session = SessionSummary {
            document_id: "scan-abc".into(),
            source_path: PathBuf::from("uploads/scan.pdf"),
            ingested_at: "2024-01-01T00:00:00Z".into(),
            fragments: 3,
            indexed: 2,
        };
        let body = serialize_json(
            &HealthSnapshot::new(description(), Some(session)),
            "mcp://health",
        );
        let value: Value = serde_json::from_str(&body).expect("valid JSON");

        assert_eq!(value["status"], "ready");
        assert_eq!(value["session"]["documentId"], "scan-abc");
        assert_eq!(value["session"]["indexed"], 2);
    }

    #[test]
    fn settings_expose_chunking_and_retrieval() {
        let payload = SettingsSnapshot {
            pipeline: description().settings,
        };
        let value: Value =
            serde_json::from_str(&serialize_json(&payload, "mcp://settings")).expect("JSON");

        assert_eq!(value["pipeline"]["chunkSize"], 700);
        assert_eq!(value["pipeline"]["chunkOverlap"], 200);
        assert_eq!(value["pipeline"]["chunkUnit"], "chars");
        assert_eq!(value["pipeline"]["topK"], 5);
        assert_eq!(value["pipeline"]["inference"]["max_tokens"], 300);
    }
}
