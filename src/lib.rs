#![deny(missing_docs)]

//! Multimodal retrieval-augmented answering over scanned documents.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Page rendering and text recognition adapters.
pub mod document;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Generative answer providers.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document ingestion and retrieval pipeline.
pub mod processing;
