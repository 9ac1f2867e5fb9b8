//! MCP handler for document ingestion.

use std::path::PathBuf;
use std::sync::Arc;

use crate::processing::{ExtractionError, ProcessingError, RagApi};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::parse_arguments;

/// Request payload accepted by the `process-document` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProcessDocumentRequest {
    /// Path of a scanned PDF readable by the server process.
    pub(crate) path: String,
}

/// Handle the `process-document` tool by ingesting the document at `path`.
pub(crate) async fn handle_process_document(
    service: &Arc<dyn RagApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: ProcessDocumentRequest = parse_arguments(arguments)?;
    let path = args.path.trim();
    if path.is_empty() {
        return Err(McpError::invalid_params("`path` must not be empty", None));
    }

    let path = PathBuf::from(path);
    let outcome = service
        .process_document(&path)
        .await
        .map_err(processing_error)?;

    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "documentId": outcome.document_id,
        "pages": outcome.page_count,
        "itemsProcessed": outcome.fragment_count,
        "indexed": outcome.indexed,
        "missingEmbeddings": outcome.missing_embeddings,
    })))
}

fn processing_error(error: ProcessingError) -> McpError {
    match &error {
        ProcessingError::Extraction(ExtractionError::Open { .. }) => {
            McpError::invalid_params(error.to_string(), None)
        }
        _ => McpError::internal_error(error.to_string(), None),
    }
}
