//! HTTP surface for scanrag.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload-pdf?filename=<name>` – Store a raw PDF body in a fresh directory under the
//!   upload root, then extract, embed and index it. Returns `{ "message", "items_processed" }`.
//!   Bodies are capped by `UPLOAD_MAX_BYTES` rather than axum's 2 MiB default.
//! - `POST /query` – Answer `{ "question" }` from the indexed document. Returns
//!   `{ "answer", "sources": [{ "page", "type" }] }`.
//! - `GET /health` – Liveness payload.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Each POST route also answers with a trailing slash. The HTTP surface shares the same pipeline
//! with the MCP server, so behavior is identical across interfaces.

use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingError, QueryAnswer, QueryError, RagApi};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Where uploads are stored and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Root directory; each upload gets its own subdirectory.
    pub dir: PathBuf,
    /// Largest accepted request body, in bytes.
    pub max_bytes: usize,
}

impl UploadSettings {
    /// Derive upload settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            max_bytes: config.upload_max_bytes,
        }
    }
}

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>, uploads: UploadSettings) -> Router
where
    S: RagApi + 'static,
{
    let body_limit = DefaultBodyLimit::max(uploads.max_bytes);
    let state = AppState {
        service,
        upload_dir: Arc::new(uploads.dir),
    };
    Router::new()
        .route("/upload-pdf", post(upload_pdf::<S>))
        .route("/upload-pdf/", post(upload_pdf::<S>))
        .route("/query", post(query::<S>))
        .route("/query/", post(query::<S>))
        .route("/health", get(health))
        .route("/health/", get(health))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(body_limit)
        .with_state(state)
}

struct AppState<S> {
    service: Arc<S>,
    upload_dir: Arc<PathBuf>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            upload_dir: Arc::clone(&self.upload_dir),
        }
    }
}

/// Query string for `POST /upload-pdf`.
#[derive(Deserialize)]
struct UploadParams {
    /// Client-side file name; must end in `.pdf`.
    filename: String,
}

/// Success response for `POST /upload-pdf`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    /// Number of fragments extracted from the document.
    items_processed: usize,
}

/// Persist an uploaded PDF and ingest it.
async fn upload_pdf<S>(
    State(state): State<AppState<S>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let file_name = upload_file_name(&params.filename)
        .ok_or_else(|| AppError::BadRequest("Only PDF files are allowed".into()))?;

    // Same-named uploads must never share a file while an earlier one is still being ingested.
    let dir = state.upload_dir.join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, &body).await?;
    tracing::info!(path = %path.display(), bytes = body.len(), "Stored upload");

    let outcome = state.service.process_document(&path).await?;
    Ok(Json(UploadResponse {
        message: "PDF processed successfully",
        items_processed: outcome.fragment_count,
    }))
}

/// Keep only the final path component and require a `.pdf` suffix.
fn upload_file_name(raw: &str) -> Option<&str> {
    let name = Path::new(raw.trim()).file_name()?.to_str()?;
    name.to_lowercase().ends_with(".pdf").then_some(name)
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

/// Answer a question from the indexed document.
async fn query<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, AppError>
where
    S: RagApi,
{
    let answer = state.service.query(&request.question).await?;
    tracing::info!(sources = answer.sources.len(), "Query answered");
    Ok(Json(answer))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "system": "multimodal-rag",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(state.service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_pdf",
                method: "POST",
                path: "/upload-pdf?filename=<name>.pdf",
                description: "Upload a scanned PDF as the raw request body. Pages are rendered, recognized, chunked and embedded; the document replaces any previously indexed one. Response returns { \"items_processed\": number }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Answer a question from the indexed document. Response returns the answer and its sources as { \"page\": number, \"type\": \"text\" | \"page_image\" }.",
                request_example: Some(json!({
                    "question": "What is the invoice total?"
                })),
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness check.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and query counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Storage(std::io::Error),
    Processing(ProcessingError),
    Query(QueryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Storage(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store upload: {error}"),
            ),
            Self::Processing(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing PDF: {error}"),
            ),
            Self::Query(error) => {
                let status = match error {
                    QueryError::IndexUnavailable => StatusCode::CONFLICT,
                    QueryError::EmptyQuestion => StatusCode::BAD_REQUEST,
                    QueryError::QueryEmbedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, error.to_string())
            }
        };
        if status.is_server_error() {
            tracing::error!(status = %status, detail = %detail, "Request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(inner: std::io::Error) -> Self {
        Self::Storage(inner)
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self::Query(inner)
    }
}
