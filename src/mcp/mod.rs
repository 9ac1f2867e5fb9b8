//! Model Context Protocol (MCP) integration for scanrag.
//!
//! This module wires the document pipeline into an MCP server so editors and agent hosts can
//! ingest scanned documents and ask questions over stdio. The surface area consists of:
//!
//! - Tools: `process-document`, `query`, and `metrics`.
//! - Resources: `mcp://health` and `mcp://settings`.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::ScanragMcpServer;
