//! Page rasterization and text recognition adapters.
//!
//! Both capabilities are opaque to the pipeline: a renderer turns a document into ordered page
//! images and a recognizer turns one page image into text. The default adapters shell out to
//! poppler's `pdftoppm` and to `tesseract`.

use crate::processing::types::PageImage;
use async_trait::async_trait;
use std::process::ExitStatus;
use thiserror::Error;

mod ocr;
mod render;

pub use ocr::TesseractRecognizer;
pub use render::PdftoppmRenderer;

/// Failures raised by external document tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be started.
    #[error("failed to launch `{tool}`: {source}")]
    Launch {
        /// Executable name.
        tool: &'static str,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The executable ran and reported failure.
    #[error("`{tool}` exited with {status}: {stderr}")]
    Failed {
        /// Executable name.
        tool: &'static str,
        /// Exit status reported by the process.
        status: ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },
    /// Scratch files could not be written or read back.
    #[error("scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// Errors produced while rasterizing a document.
pub type RenderError = ToolError;

/// Errors produced while recognizing text on a page.
pub type RecognitionError = ToolError;

/// Converts a document into page images in page order.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render every page of the encoded `document`. A document without pages yields an empty
    /// vector.
    ///
    /// Taking bytes rather than a path ties the pages to the exact content the document id was
    /// derived from, even if the source file changes mid-ingestion.
    async fn render(&self, document: &[u8]) -> Result<Vec<PageImage>, RenderError>;

    /// Adapter name for logs and health payloads.
    fn name(&self) -> &str;
}

/// Recognizes text on a rendered page.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Return the text found on `page`, possibly empty.
    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError>;

    /// Adapter name for logs and health payloads.
    fn name(&self) -> &str;
}

async fn run_tool(
    tool: &'static str,
    command: &mut tokio::process::Command,
) -> Result<std::process::Output, ToolError> {
    let output = command
        .output()
        .await
        .map_err(|source| ToolError::Launch { tool, source })?;
    if !output.status.success() {
        return Err(ToolError::Failed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
