//! Durable storage for uploaded media
//!
//! Blobs are written under a collision-free name (`<uuid>_<original name>`)
//! so they can outlive the request that uploaded them: deferred entries keep
//! referring to the stored file until the dispatcher publishes them.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MediaError, PagecastError, Result};
use crate::types::{EntryMedia, MediaKind, MediaType};

/// Longest original-name suffix kept in a stored file name
const MAX_NAME_LEN: usize = 80;

/// An uploaded blob as received in a submission
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaBlob {
    /// Load a blob from disk, guessing the content type from the extension
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` if the extension is unknown and
    /// `MediaError::Io` if the file can't be read.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let content_type = MediaType::mime_from_extension(ext).ok_or_else(|| {
            PagecastError::InvalidInput(format!(
                "Unsupported media file {}: unknown extension, only images and videos can be published",
                path.display()
            ))
        })?;

        let data = tokio::fs::read(path).await.map_err(MediaError::Io)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            data,
        })
    }

    /// Media class of this blob
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` when the content type is neither
    /// an image nor a video.
    pub fn media_type(&self) -> Result<MediaType> {
        MediaType::from_mime_str(&self.content_type).ok_or_else(|| {
            PagecastError::InvalidInput(format!(
                "Unsupported content type '{}' for {}: only images and videos can be published",
                self.content_type, self.file_name
            ))
        })
    }
}

/// A blob persisted in the media store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Stable reference (absolute path) usable by later steps
    pub reference: String,
    pub file_name: String,
    pub content_type: String,
    pub media_type: MediaType,
    pub size: u64,
    /// SHA-256 of the content, hex encoded
    pub sha256: String,
}

impl StoredMedia {
    pub fn path(&self) -> &Path {
        Path::new(&self.reference)
    }

    /// Everything an entry needs to publish this file later
    pub fn entry_media(&self, kind: MediaKind) -> EntryMedia<'_> {
        EntryMedia {
            reference: &self.reference,
            file_name: &self.file_name,
            content_type: &self.content_type,
            kind,
        }
    }
}

/// Directory-backed media store
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open (and create if needed) a store rooted at `dir`
    ///
    /// `~` is expanded. The root is made absolute so references stay valid
    /// for processes started from another working directory.
    pub fn new(dir: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(dir).to_string();
        std::fs::create_dir_all(&expanded).map_err(MediaError::Io)?;
        let root = std::fs::canonicalize(&expanded).map_err(MediaError::Io)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save a blob and return its stored reference
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` for unsupported content types
    /// (checked before anything is written) and `MediaError::Io` if the
    /// write fails.
    pub async fn save(&self, blob: &MediaBlob) -> Result<StoredMedia> {
        let media_type = blob.media_type()?;
        let stored_name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(&blob.file_name)
        );
        let path = self.root.join(&stored_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(MediaError::Io)?;
        file.write_all(&blob.data).await.map_err(MediaError::Io)?;
        file.flush().await.map_err(MediaError::Io)?;

        let sha256 = format!("{:x}", Sha256::digest(&blob.data));
        debug!(
            "Stored {} ({} bytes, sha256 {}) as {}",
            blob.file_name,
            blob.data.len(),
            sha256,
            stored_name
        );

        Ok(StoredMedia {
            reference: path.to_string_lossy().to_string(),
            file_name: blob.file_name.clone(),
            content_type: blob.content_type.clone(),
            media_type,
            size: blob.data.len() as u64,
            sha256,
        })
    }

    /// Remove a stored blob
    ///
    /// Removing a reference that no longer exists succeeds.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Io` for any other filesystem failure; callers
    /// treat this as best-effort cleanup and log it.
    pub async fn remove(&self, reference: &str) -> Result<()> {
        match tokio::fs::remove_file(reference).await {
            Ok(()) => {
                debug!("Removed stored media {}", reference);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Io(e).into()),
        }
    }
}

/// Keep the last path component and replace anything outside a safe set
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        return "upload".to_string();
    }

    let start = trimmed.len().saturating_sub(MAX_NAME_LEN);
    trimmed[start..].to_string()
}
