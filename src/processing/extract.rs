//! Turning one source document into ordered per-page fragments.

use super::chunking::TextChunker;
use super::storage::{DocumentStorage, FragmentStore};
use super::types::{ExtractionError, Fragment, PageImage};
use crate::document::{PageRenderer, TextRecognizer};
use std::path::Path;

/// Fragments produced from one document, in extraction order.
#[derive(Debug)]
pub struct Extraction {
    /// Content-addressed document identifier.
    pub document_id: String,
    /// Number of rendered pages.
    pub page_count: usize,
    /// Text chunks of each page followed by that page's image.
    pub fragments: Vec<Fragment>,
    /// Staged payloads; commit before publishing the fragments, discard otherwise.
    pub storage: DocumentStorage,
}

/// Renders, recognizes, chunks and persists a document.
pub struct FragmentExtractor<'a> {
    renderer: &'a dyn PageRenderer,
    recognizer: &'a dyn TextRecognizer,
    chunker: &'a TextChunker,
    store: &'a FragmentStore,
}

impl<'a> FragmentExtractor<'a> {
    /// Bundle the collaborators used for one extraction pass.
    pub fn new(
        renderer: &'a dyn PageRenderer,
        recognizer: &'a dyn TextRecognizer,
        chunker: &'a TextChunker,
        store: &'a FragmentStore,
    ) -> Self {
        Self {
            renderer,
            recognizer,
            chunker,
            store,
        }
    }

    /// Extract fragments from `path`, one pass per page in increasing page order.
    ///
    /// Recognition failures degrade to "no text" for the affected page. Open, render and
    /// persistence failures abort the extraction.
    pub async fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractionError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let document_id = FragmentStore::document_id(path, &bytes);

        let pages = self.renderer.render(&bytes).await?;
        drop(bytes);
        let page_count = pages.len();
        tracing::debug!(
            document_id = %document_id,
            pages = page_count,
            renderer = self.renderer.name(),
            "Rendered document pages"
        );

        let storage = self.store.prepare(&document_id).await?;
        let fragments = match self.extract_pages(&document_id, pages, &storage).await {
            Ok(fragments) => fragments,
            Err(error) => {
                storage.discard().await;
                return Err(error);
            }
        };

        Ok(Extraction {
            document_id,
            page_count,
            fragments,
            storage,
        })
    }

    async fn extract_pages(
        &self,
        document_id: &str,
        pages: Vec<PageImage>,
        storage: &DocumentStorage,
    ) -> Result<Vec<Fragment>, ExtractionError> {
        let mut fragments = Vec::new();
        for (page, image) in pages.into_iter().enumerate() {
            let text = match self.recognizer.recognize(&image).await {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(
                        document_id = %document_id,
                        page,
                        error = %error,
                        "Text recognition failed; treating page as empty"
                    );
                    String::new()
                }
            };

            let chunks = self.chunker.chunk(&text);
            let chunk_count = chunks.len();
            for (sequence, chunk) in chunks.into_iter().enumerate() {
                let stored = storage.write_text(page, sequence, &chunk).await?;
                fragments.push(Fragment::text(page, chunk, stored));
            }

            let stored = storage.write_page_image(page, &image).await?;
            fragments.push(Fragment::page_image(page, image, stored));
            tracing::trace!(page, chunks = chunk_count, "Extracted page");
        }
        Ok(fragments)
    }
}
