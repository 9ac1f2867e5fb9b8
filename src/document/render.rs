use super::{PageRenderer, RenderError, ToolError, run_tool};
use crate::processing::types::{ImageFormat, PageImage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const TOOL: &str = "pdftoppm";
const PAGE_PREFIX: &str = "page";
const SOURCE_FILE: &str = "source.pdf";

/// Renders PDF pages to PNG through poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    dpi: u32,
}

impl PdftoppmRenderer {
    /// Create a renderer producing images at `dpi`.
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render(&self, document: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        let scratch = tempfile::Builder::new().prefix("scanrag-render-").tempdir()?;
        let source = scratch.path().join(SOURCE_FILE);
        tokio::fs::write(&source, document).await?;
        let output_root = scratch.path().join(PAGE_PREFIX);

        let mut command = Command::new(TOOL);
        command
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&source)
            .arg(&output_root);
        run_tool(TOOL, &mut command).await?;

        let mut pages = page_files(scratch.path()).await?;
        pages.sort_by_key(|(number, _)| *number);

        let mut images = Vec::with_capacity(pages.len());
        for (_, file) in pages {
            let data = tokio::fs::read(&file).await.map_err(ToolError::Scratch)?;
            images.push(PageImage {
                format: ImageFormat::Png,
                data,
            });
        }

        tracing::debug!(
            bytes = document.len(),
            dpi = self.dpi,
            pages = images.len(),
            "Rendered document"
        );
        Ok(images)
    }

    fn name(&self) -> &str {
        TOOL
    }
}

async fn page_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>, ToolError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(number) = page_number(&path) {
            pages.push((number, path));
        }
    }
    Ok(pages)
}

/// Parse the page number from `page-<n>.png`. Zero padding width depends on the page count.
fn page_number(path: &Path) -> Option<usize> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (prefix, number) = stem.rsplit_once('-')?;
    if prefix != PAGE_PREFIX {
        return None;
    }
    number.parse().ok()
}
