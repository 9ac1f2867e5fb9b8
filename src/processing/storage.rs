//! Durable copies of fragment payloads.
//!
//! Layout under the storage root:
//! `<document_id>/text/text_<page>_<seq>.txt` and `<document_id>/page_images/page_<page:03>.png`.
//! An ingestion writes into `.<document_id>.staging` and swaps it in when committed.

use super::types::{ExtractionError, PageImage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const TEXT_DIR: &str = "text";
const IMAGE_DIR: &str = "page_images";
const HASH_PREFIX_LEN: usize = 12;
const STAGING_SUFFIX: &str = ".staging";
const RETIRED_SUFFIX: &str = ".retired";

/// Root directory holding one subdirectory per ingested document.
#[derive(Debug, Clone)]
pub struct FragmentStore {
    root: PathBuf,
}

impl FragmentStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable identifier for a document: sanitized file stem plus a content hash prefix.
    pub fn document_id(path: &Path, bytes: &[u8]) -> String {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(sanitize_stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "document".to_string());
        let digest = hex::encode(Sha256::digest(bytes));
        format!("{stem}-{}", &digest[..HASH_PREFIX_LEN])
    }

    /// Start a fresh staging tree for `document_id`.
    ///
    /// Payloads are written under a hidden staging directory and only replace the document's
    /// published directory on [`DocumentStorage::commit`], so a failed re-ingestion leaves the
    /// files of the published session untouched.
    pub async fn prepare(&self, document_id: &str) -> Result<DocumentStorage, ExtractionError> {
        let storage = DocumentStorage {
            dir: self.root.join(document_id),
            staging: self.root.join(format!(".{document_id}{STAGING_SUFFIX}")),
            retired: self.root.join(format!(".{document_id}{RETIRED_SUFFIX}")),
        };
        remove_if_present(&storage.staging).await?;
        for sub in [TEXT_DIR, IMAGE_DIR] {
            let path = storage.staging.join(sub);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|source| ExtractionError::Persist { path, source })?;
        }
        Ok(storage)
    }
}

/// Per-document staging area handed to the extractor.
///
/// Paths returned by the writers are final locations; they resolve once the storage is committed.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    dir: PathBuf,
    staging: PathBuf,
    retired: PathBuf,
}

impl DocumentStorage {
    /// Directory holding this document's payloads once committed.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one text chunk and return its final path.
    pub async fn write_text(
        &self,
        page: usize,
        sequence: usize,
        text: &str,
    ) -> Result<PathBuf, ExtractionError> {
        let relative = Path::new(TEXT_DIR).join(format!("text_{page}_{sequence}.txt"));
        self.write(&relative, text.as_bytes()).await
    }

    /// Persist one rendered page and return its final path.
    pub async fn write_page_image(
        &self,
        page: usize,
        image: &PageImage,
    ) -> Result<PathBuf, ExtractionError> {
        let relative =
            Path::new(IMAGE_DIR).join(format!("page_{page:03}.{}", image.format.as_str()));
        self.write(&relative, &image.data).await
    }

    /// Move the staged payloads into place, replacing any earlier copy of the document.
    pub async fn commit(self) -> Result<PathBuf, ExtractionError> {
        remove_if_present(&self.retired).await?;
        match tokio::fs::rename(&self.dir, &self.retired).await {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ExtractionError::Persist {
                    path: self.dir,
                    source,
                });
            }
        }
        tokio::fs::rename(&self.staging, &self.dir)
            .await
            .map_err(|source| ExtractionError::Persist {
                path: self.dir.clone(),
                source,
            })?;
        if let Err(error) = remove_if_present(&self.retired).await {
            tracing::warn!(error = %error, "Failed to remove retired payloads");
        }
        Ok(self.dir)
    }

    /// Drop the staged payloads, leaving the committed directory as it was.
    pub async fn discard(self) {
        if let Err(error) = remove_if_present(&self.staging).await {
            tracing::warn!(error = %error, "Failed to remove staged payloads");
        }
    }

    async fn write(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf, ExtractionError> {
        let staged = self.staging.join(relative);
        match tokio::fs::write(&staged, bytes).await {
            Ok(()) => Ok(self.dir.join(relative)),
            Err(source) => Err(ExtractionError::Persist {
                path: staged,
                source,
            }),
        }
    }
}

async fn remove_if_present(dir: &Path) -> Result<(), ExtractionError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ExtractionError::Persist {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
