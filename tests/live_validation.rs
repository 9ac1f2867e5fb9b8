use std::{env, path::PathBuf, sync::Once};

use scanrag::{
    config,
    document::{PageRenderer, PdftoppmRenderer, TesseractRecognizer, TextRecognizer},
    embedding::{self, EmbeddingInput},
    generation::{self, ContentBlock, GenerationRequest, InferenceSettings},
    processing::{DocumentService, Modality},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("EMBEDDING_PROVIDER", "http");
        set_default_env("EMBEDDING_URL", "http://127.0.0.1:8080/embed");
        set_default_env("EMBEDDING_DIMENSION", "384");
        set_default_env("GENERATION_PROVIDER", "ollama");
        set_default_env("GENERATION_URL", "http://127.0.0.1:11434");
        set_default_env("GENERATION_MODEL", "llava");
        config::init_config();
    });
}

/// Scanned PDF used by the live tests, supplied through `SCANRAG_LIVE_PDF`.
fn live_pdf() -> PathBuf {
    env::var("SCANRAG_LIVE_PDF")
        .map(PathBuf::from)
        .expect("SCANRAG_LIVE_PDF must point at a scanned PDF")
}

#[tokio::test]
#[ignore = "Requires pdftoppm, tesseract and SCANRAG_LIVE_PDF"]
async fn live_render_and_recognize() {
    let renderer = PdftoppmRenderer::new(150);
    let document = std::fs::read(live_pdf()).expect("read live pdf");
    let pages = renderer.render(&document).await.expect("render pages");
    assert!(!pages.is_empty(), "document should have at least one page");
    assert!(pages[0].data.starts_with(b"\x89PNG"), "pages must be PNG");

    let recognizer = TesseractRecognizer::new("eng".to_string());
    let text = recognizer.recognize(&pages[0]).await.expect("recognize");
    assert!(!text.trim().is_empty(), "first page should carry text");
}

#[tokio::test]
#[ignore = "Requires a live multimodal embedding endpoint"]
async fn live_embedding_roundtrip() {
    init_config_once();
    let config = config::get_config();
    let client = embedding::get_embedding_client(config);

    let vector = client
        .embed(
            EmbeddingInput::Text("scanrag live embedding"),
            config.embedding_dimension,
        )
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vector.len(), config.embedding_dimension, "dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires a live generation endpoint"]
async fn live_generation_answers() {
    init_config_once();
    let client = generation::get_generation_client(config::get_config());
    let request = GenerationRequest {
        system: "Answer briefly.",
        context: vec![ContentBlock::Text("The invoice total is 1,250 EUR.")],
        question: "What is the invoice total?",
        inference: InferenceSettings::default(),
    };

    let answer = client.generate(&request).await.expect("generation");
    assert!(!answer.trim().is_empty());
}

#[tokio::test]
#[ignore = "Requires every live dependency and SCANRAG_LIVE_PDF"]
async fn live_end_to_end_query() {
    init_config_once();
    let service = DocumentService::new(config::get_config()).expect("service");

    let outcome = service
        .process_document(&live_pdf())
        .await
        .expect("process document");
    assert!(outcome.indexed > 0);

    let answer = service
        .query("What is this document about?")
        .await
        .expect("query");
    assert!(!answer.sources.is_empty());
    assert!(
        answer
            .sources
            .iter()
            .all(|source| source.page < outcome.page_count
                && matches!(source.modality, Modality::Text | Modality::PageImage))
    );
}
