//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{HealthSnapshot, SettingsSnapshot, json_resource_contents, serialize_json},
        handlers::{
            ingest::{ProcessDocumentRequest, handle_process_document},
            metrics::handle_metrics,
            query::{QueryToolRequest, handle_query},
        },
        registry, schemas,
    },
    processing::RagApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const HEALTH_URI: &str = "mcp://health";
const SETTINGS_URI: &str = "mcp://settings";

/// MCP server implementation exposing the document pipeline.
#[derive(Clone)]
pub struct ScanragMcpServer {
    service: Arc<dyn RagApi>,
    registry: Arc<registry::Registry>,
}

impl ScanragMcpServer {
    /// Create a new MCP server driving the supplied pipeline.
    pub fn new(service: Arc<dyn RagApi>) -> Self {
        let mut registry = registry::Registry::default();
        registry.register_resource(HEALTH_URI, resource_health);
        registry.register_resource(SETTINGS_URI, resource_settings);

        registry.register_tool("process-document", tool_process_document);
        registry.register_tool("query", tool_query);
        registry.register_tool("metrics", tool_metrics);

        Self {
            service,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: Cow::Borrowed("process-document"),
                title: Some("Process Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Render, recognize, chunk and embed a scanned PDF. Replaces the previously processed document.",
                )),
                input_schema: Arc::new(schemas::input_schema::<ProcessDocumentRequest>()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Process Document")
                        .destructive(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("query"),
                title: Some("Ask Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Answer a question from the processed document; returns the answer and the pages and modalities it drew on.",
                )),
                input_schema: Arc::new(schemas::input_schema::<QueryToolRequest>()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Ask Document")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("metrics"),
                title: Some("Metrics Snapshot".to_string()),
                description: Some(Cow::Borrowed(
                    "Check ingestion volume, embedding failures and answered questions at a glance.",
                )),
                input_schema: Arc::new(schemas::empty_object_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Metrics Snapshot")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut health = RawResource::new(HEALTH_URI, "health");
        health.description =
            Some("Wired providers, embedding dimension and the processed document".into());

        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description = Some("Effective chunking, retrieval and generation settings".into());

        vec![health.no_annotation(), settings.no_annotation()]
    }
}

fn resource_health(
    server: &ScanragMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let service = server.service.clone();
    Box::pin(async move {
        let session = service.session_summary().await;
        let payload = HealthSnapshot::new(service.describe(), session);
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                HEALTH_URI,
                serialize_json(&payload, HEALTH_URI),
            )],
        })
    })
}

fn resource_settings(
    server: &ScanragMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let service = server.service.clone();
    Box::pin(async move {
        let payload = SettingsSnapshot {
            pipeline: service.describe().settings,
        };
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(&payload, SETTINGS_URI),
            )],
        })
    })
}

fn tool_process_document(
    server: &ScanragMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_process_document(&service, request.arguments).await })
}

fn tool_query(server: &ScanragMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_query(&service, request.arguments).await })
}

fn tool_metrics(
    server: &ScanragMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_metrics(&service).await })
}

impl ServerHandler for ScanragMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "scanrag".to_string();
        implementation.title = Some("Scanned Document RAG".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Process a scanned PDF with `process-document`, then ask questions with `query`. Answers cite the pages and modalities (text or page image) they were grounded on.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resources.get(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
