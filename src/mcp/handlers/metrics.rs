//! Handler for the metrics tool.

use std::sync::Arc;

use crate::processing::RagApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `metrics` tool, returning the current pipeline counters.
pub(crate) async fn handle_metrics(service: &Arc<dyn RagApi>) -> Result<CallToolResult, McpError> {
    let snapshot = service.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "documentsProcessed": snapshot.documents_processed,
        "fragmentsExtracted": snapshot.fragments_extracted,
        "embeddingsFailed": snapshot.embeddings_failed,
        "queriesAnswered": snapshot.queries_answered,
        "generationFailures": snapshot.generation_failures,
        "lastIndexSize": snapshot.last_index_size,
    })))
}
