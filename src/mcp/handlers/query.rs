//! MCP handler for question answering.

use std::sync::Arc;

use crate::processing::{QueryError, RagApi};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::parse_arguments;

/// Request payload accepted by the `query` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct QueryToolRequest {
    /// Natural-language question about the processed document.
    pub(crate) question: String,
}

/// Handle the `query` tool: retrieve fragments and compose a grounded answer.
pub(crate) async fn handle_query(
    service: &Arc<dyn RagApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: QueryToolRequest = parse_arguments(arguments)?;
    let answer = service.query(&args.question).await.map_err(query_error)?;

    Ok(CallToolResult::structured(json!({
        "answer": answer.answer,
        "sources": answer.sources,
    })))
}

fn query_error(error: QueryError) -> McpError {
    match error {
        QueryError::IndexUnavailable => McpError::invalid_request(error.to_string(), None),
        QueryError::EmptyQuestion => McpError::invalid_params(error.to_string(), None),
        QueryError::QueryEmbedding(_) => McpError::internal_error(error.to_string(), None),
    }
}
