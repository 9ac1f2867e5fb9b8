use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    handler::client::ClientHandler,
    model::{
        self, CallToolRequestParam, ClientInfo, JsonObject, PaginatedRequestParam,
        ReadResourceRequestParam, ResourceContents,
    },
    service::{RoleClient, RoleServer, RunningService, Service, serve_directly},
    transport::async_rw::AsyncRwTransport,
};
use scanrag::{
    config::ChunkUnit,
    document::{PageRenderer, RecognitionError, RenderError, TextRecognizer},
    embedding::HashingEmbeddingClient,
    generation::{
        GenerationClient, GenerationClientError, GenerationRequest, InferenceSettings,
    },
    logging,
    mcp::ScanragMcpServer,
    processing::{
        DocumentService, ImageFormat, PageImage, PipelineSettings, ServiceComponents,
        storage::FragmentStore,
    },
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::{io::split, sync::OnceCell};

static INIT: OnceCell<()> = OnceCell::const_new();

const PAGES: [&str; 2] = [
    "Invoice 1042 issued to Northwind Traders",
    "Total due: 1,250 EUR by March 31",
];

struct TwoPageRenderer;

#[async_trait]
impl PageRenderer for TwoPageRenderer {
    async fn render(&self, _document: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        Ok((0..PAGES.len())
            .map(|page| PageImage {
                format: ImageFormat::Png,
                data: vec![page as u8, 0x89, b'P', b'N', b'G'],
            })
            .collect())
    }

    fn name(&self) -> &str {
        "two-page"
    }
}

struct TableRecognizer;

#[async_trait]
impl TextRecognizer for TableRecognizer {
    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError> {
        Ok(PAGES[usize::from(page.data[0])].to_string())
    }

    fn name(&self) -> &str {
        "table"
    }
}

struct EchoGenerator;

#[async_trait]
impl GenerationClient for EchoGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<String, GenerationClientError> {
        Ok(format!("answered: {}", request.question))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[derive(Clone, Default)]
struct DummyClientHandler;

impl ClientHandler for DummyClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

struct TestHarness {
    service: RunningService<RoleClient, DummyClientHandler>,
    server: RunningService<RoleServer, ScanragMcpServer>,
    document: PathBuf,
    _dirs: (TempDir, TempDir),
}

impl TestHarness {
    async fn new() -> Self {
        INIT.get_or_init(|| async {
            logging::init_tracing_stderr();
        })
        .await;

        let storage = tempfile::tempdir().expect("storage dir");
        let inputs = tempfile::tempdir().expect("input dir");
        let document = inputs.path().join("invoice.pdf");
        std::fs::write(&document, b"%PDF-1.4 invoice").expect("write document");

        let components = ServiceComponents {
            renderer: Box::new(TwoPageRenderer),
            recognizer: Box::new(TableRecognizer),
            embedding_client: Box::new(HashingEmbeddingClient::new()),
            generation_client: Box::new(EchoGenerator),
            store: FragmentStore::new(storage.path()),
        };
        let settings = PipelineSettings {
            dimension: 48,
            embedding_concurrency: 2,
            top_k: 3,
            chunk_size: 700,
            chunk_overlap: 200,
            chunk_unit: ChunkUnit::Chars,
            inference: InferenceSettings::default(),
        };
        let processing =
            DocumentService::with_components(components, settings).expect("document service");
        let server = ScanragMcpServer::new(Arc::new(processing));

        let (client_stream, server_stream) = tokio::io::duplex(16 * 1024);
        let (client_read, client_write) = split(client_stream);
        let (server_read, server_write) = split(server_stream);

        let client_transport = AsyncRwTransport::new_client(client_read, client_write);
        let server_transport = AsyncRwTransport::new_server(server_read, server_write);

        let server_info = server.get_info();
        let client_handler = DummyClientHandler;
        let client_info = ClientHandler::get_info(&client_handler);

        let server =
            serve_directly::<RoleServer, _, _, _, _>(server, server_transport, Some(client_info));
        let service = serve_directly::<RoleClient, _, _, _, _>(
            client_handler,
            client_transport,
            Some(server_info),
        );

        Self {
            service,
            server,
            document,
            _dirs: (storage, inputs),
        }
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value, model::ErrorData> {
        let arguments: JsonObject = arguments.as_object().cloned().unwrap_or_default();
        let response = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await;
        match response {
            Ok(result) => {
                assert_eq!(result.is_error, Some(false));
                Ok(result.structured_content.expect("structured payload"))
            }
            Err(rmcp::service::ServiceError::McpError(data)) => Err(data),
            Err(other) => panic!("expected MCP error, got {other:?}"),
        }
    }

    async fn shutdown(self) {
        let Self {
            service, server, ..
        } = self;
        let _ = service.cancel().await;
        let _ = server.cancel().await;
    }
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let harness = TestHarness::new().await;
    let service = &harness.service;

    let info = service
        .peer_info()
        .expect("server info should be initialized");
    assert_eq!(info.server_info.name, "scanrag");
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.resources.is_some());

    let tools_result = service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");
    let names: Vec<_> = tools_result
        .tools
        .iter()
        .map(|tool| tool.name.as_ref())
        .collect();

    assert!(names.contains(&"process-document"));
    assert!(names.contains(&"query"));
    assert!(names.contains(&"metrics"));

    harness.shutdown().await;
}

#[tokio::test]
async fn process_then_query_returns_sources() {
    let harness = TestHarness::new().await;

    let processed = harness
        .call(
            "process-document",
            json!({ "path": harness.document.display().to_string() }),
        )
        .await
        .expect("process-document");
    assert_eq!(processed["status"], "ok");
    assert_eq!(processed["pages"], 2);
    assert_eq!(processed["itemsProcessed"], 4);
    assert_eq!(processed["indexed"], 4);
    assert!(
        processed["documentId"]
            .as_str()
            .is_some_and(|id| id.starts_with("invoice-"))
    );

    let answer = harness
        .call("query", json!({ "question": "What is the total due?" }))
        .await
        .expect("query");
    assert_eq!(answer["answer"], "answered: What is the total due?");
    let sources = answer["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 3);
    for source in sources {
        assert!(source["page"].as_u64().is_some_and(|page| page < 2));
        assert!(matches!(
            source["type"].as_str(),
            Some("text") | Some("page_image")
        ));
    }

    let metrics = harness.call("metrics", json!({})).await.expect("metrics");
    assert_eq!(metrics["documentsProcessed"], 1);
    assert_eq!(metrics["queriesAnswered"], 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn query_before_processing_is_invalid_request() {
    let harness = TestHarness::new().await;

    let err = harness
        .call("query", json!({ "question": "Anything there?" }))
        .await
        .expect_err("no document yet");
    assert_eq!(err.code, model::ErrorCode::INVALID_REQUEST);

    harness.shutdown().await;
}

#[tokio::test]
async fn invalid_arguments_return_invalid_params() {
    let harness = TestHarness::new().await;

    let err = harness
        .call("process-document", json!({ "path": "  " }))
        .await
        .expect_err("empty path");
    assert_eq!(err.code, model::ErrorCode::INVALID_PARAMS);

    let err = harness
        .call("process-document", json!({ "path": "/missing/scan.pdf" }))
        .await
        .expect_err("unreadable path");
    assert_eq!(err.code, model::ErrorCode::INVALID_PARAMS);

    harness
        .call(
            "process-document",
            json!({ "path": harness.document.display().to_string() }),
        )
        .await
        .expect("process-document");
    let err = harness
        .call("query", json!({ "question": "" }))
        .await
        .expect_err("empty question");
    assert_eq!(err.code, model::ErrorCode::INVALID_PARAMS);

    harness.shutdown().await;
}

#[tokio::test]
async fn health_resource_reports_session() {
    let harness = TestHarness::new().await;

    harness
        .call(
            "process-document",
            json!({ "path": harness.document.display().to_string() }),
        )
        .await
        .expect("process-document");

    let result = harness
        .service
        .read_resource(ReadResourceRequestParam {
            uri: "mcp://health".into(),
        })
        .await
        .expect("read health");
    let text = match result.contents.first() {
        Some(ResourceContents::TextResourceContents { text, .. }) => text.clone(),
        other => panic!("expected text contents, got {other:?}"),
    };
    let payload: Value = serde_json::from_str(&text).expect("health json");

    assert_eq!(payload["status"], "ready");
    assert_eq!(payload["dimension"], 48);
    assert_eq!(payload["providers"]["embedding"], "hashing");
    assert_eq!(payload["session"]["indexed"], 4);

    harness.shutdown().await;
}
