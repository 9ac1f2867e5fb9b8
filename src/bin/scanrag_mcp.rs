//! MCP server entrypoint (stdio transport).
//!
//! Launches an MCP server that exposes document processing and question answering over stdio.
//! Stdout carries the protocol, so console logs go to stderr. Runtime configuration is shared
//! with the HTTP binary.
use anyhow::{Context, Result};
use rmcp::{service::ServiceExt, transport::stdio};
use scanrag::{config, logging, mcp::ScanragMcpServer, processing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing_stderr();

    let service = processing::DocumentService::new(config::get_config())
        .context("failed to build document service")?;
    let server = ScanragMcpServer::new(Arc::new(service));

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
