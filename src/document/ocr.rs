use super::{RecognitionError, TextRecognizer, run_tool};
use crate::processing::types::PageImage;
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;

const TOOL: &str = "tesseract";

/// Recognizes page text with the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    language: String,
}

impl TesseractRecognizer {
    /// Create a recognizer using the given language pack (for example `eng`).
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError> {
        let scratch = stage_page(page).await?;

        let mut command = Command::new(TOOL);
        command
            .arg(scratch.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language);
        let output = run_tool(TOOL, &mut command).await?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        TOOL
    }
}

/// Write `page` to a scratch file whose extension matches its encoding.
async fn stage_page(page: &PageImage) -> Result<NamedTempFile, RecognitionError> {
    let suffix = format!(".{}", page.format.as_str());
    let scratch = tempfile::Builder::new()
        .prefix("scanrag-ocr-")
        .suffix(&suffix)
        .tempfile()?;
    tokio::fs::write(scratch.path(), &page.data).await?;
    Ok(scratch)
}
