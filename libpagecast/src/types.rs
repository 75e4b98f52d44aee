//! Core types for Pagecast

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{PagecastError, Result};

/// Per-page access token
///
/// Wraps the token in a `SecretString` so it is zeroed on drop and
/// redacted from `Debug` output.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Borrow the raw token for an outbound request
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// A destination page together with its own access credential
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub credential: Credential,
}

impl Target {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential: Credential::new(token),
        }
    }
}

// ============================================================================
// Media Types
// ============================================================================

/// Broad class of an uploaded blob, derived from its content type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Classify a MIME string (e.g., "image/jpeg", "video/mp4")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("image/") {
            Some(Self::Image)
        } else if lower.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Guess a MIME string from a file extension
    pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            "bmp" => Some("image/bmp"),
            "mp4" | "m4v" => Some("video/mp4"),
            "mov" => Some("video/quicktime"),
            "avi" => Some("video/x-msvideo"),
            "mkv" => Some("video/x-matroska"),
            "webm" => Some("video/webm"),
            _ => None,
        }
    }
}

/// How a stored media item is published
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Reel,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Reel => "reel",
        }
    }

    /// Resolve the publish kind for a blob
    ///
    /// Images are always photos. Videos follow the submission's selector:
    /// `Reel` publishes reels, anything else publishes regular videos.
    pub fn resolve(media_type: MediaType, selector: MediaKind) -> Self {
        match (media_type, selector) {
            (MediaType::Image, _) => Self::Photo,
            (MediaType::Video, Self::Reel) => Self::Reel,
            (MediaType::Video, _) => Self::Video,
        }
    }
}

impl FromStr for MediaKind {
    type Err = PagecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            "reel" => Ok(Self::Reel),
            other => Err(PagecastError::InvalidInput(format!(
                "Unknown media kind '{}'. Valid options: photo, video, reel",
                other
            ))),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a single publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Media(MediaKind),
}

impl From<Option<MediaKind>> for ContentKind {
    fn from(kind: Option<MediaKind>) -> Self {
        kind.map(ContentKind::Media).unwrap_or(ContentKind::Text)
    }
}

// ============================================================================
// Lifecycle Records
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Posted,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = PagecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "posted" => Ok(Self::Posted),
            "failed" => Ok(Self::Failed),
            other => Err(PagecastError::InvalidInput(format!(
                "Unknown entry status: {}",
                other
            ))),
        }
    }
}

/// Stored media published by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMedia<'a> {
    /// Media store reference
    pub reference: &'a str,
    /// Name the file was uploaded with
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub kind: MediaKind,
}

/// One scheduled or completed publish for a single (content, target) pair
#[derive(Debug, Clone)]
pub struct ScheduledEntry {
    pub id: String,
    pub submission_id: String,
    pub platform_content_id: Option<String>,
    pub message: Option<String>,
    /// Unix timestamp the entry should be (or was) published at
    pub scheduled_at: i64,
    /// Unix timestamp after which the platform content must be deleted
    pub delete_at: Option<i64>,
    pub target_id: String,
    pub target_credential: Credential,
    pub media_reference: Option<String>,
    pub media_file_name: Option<String>,
    pub media_content_type: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub status: EntryStatus,
    pub created_at: i64,
    pub posted_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub error_message: Option<String>,
}

impl ScheduledEntry {
    /// Create a pending entry awaiting dispatch
    pub fn pending(
        submission_id: &str,
        target: &Target,
        message: Option<&str>,
        media: Option<EntryMedia<'_>>,
        scheduled_at: i64,
        delete_at: Option<i64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            platform_content_id: None,
            message: message.map(str::to_string),
            scheduled_at,
            delete_at,
            target_id: target.id.clone(),
            target_credential: target.credential.clone(),
            media_reference: media.map(|m| m.reference.to_string()),
            media_file_name: media.map(|m| m.file_name.to_string()),
            media_content_type: media.map(|m| m.content_type.to_string()),
            media_kind: media.map(|m| m.kind),
            status: EntryStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
            posted_at: None,
            deleted_at: None,
            error_message: None,
        }
    }

    /// Create an entry for content the platform has already accepted
    pub fn posted(
        submission_id: &str,
        target: &Target,
        message: Option<&str>,
        media: Option<EntryMedia<'_>>,
        platform_content_id: String,
        posted_at: i64,
        delete_at: Option<i64>,
    ) -> Self {
        let mut entry = Self::pending(submission_id, target, message, media, posted_at, delete_at);
        entry.platform_content_id = Some(platform_content_id);
        entry.status = EntryStatus::Posted;
        entry.posted_at = Some(posted_at);
        entry
    }

    /// Publish kind for this entry
    pub fn content_kind(&self) -> ContentKind {
        self.media_kind.into()
    }

    /// Media this entry publishes, if any
    pub fn media(&self) -> Option<EntryMedia<'_>> {
        Some(EntryMedia {
            reference: self.media_reference.as_deref()?,
            file_name: self.media_file_name.as_deref()?,
            content_type: self.media_content_type.as_deref()?,
            kind: self.media_kind?,
        })
    }

    /// Target rebuilt from the stored id and credential
    pub fn target(&self) -> Target {
        Target {
            id: self.target_id.clone(),
            credential: self.target_credential.clone(),
        }
    }

    /// Check the record invariants
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let has_message = self
            .message
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false);

        if !has_message && self.media_reference.is_none() {
            return Err(PagecastError::InvalidInput(format!(
                "Entry {} has neither a message nor media",
                self.id
            )));
        }

        let has_media = self.media_reference.is_some();
        if self.media_kind.is_some() != has_media
            || self.media_file_name.is_some() != has_media
            || self.media_content_type.is_some() != has_media
        {
            return Err(PagecastError::InvalidInput(format!(
                "Entry {} must carry media kind, file name and content type exactly when it references media",
                self.id
            )));
        }

        if let Some(delete_at) = self.delete_at {
            if delete_at <= self.scheduled_at {
                return Err(PagecastError::InvalidInput(format!(
                    "Entry {} deletion time must be after its scheduled time",
                    self.id
                )));
            }
        }

        if self.target_id.trim().is_empty() {
            return Err(PagecastError::InvalidInput(format!(
                "Entry {} has no target page",
                self.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new("1001", "page-token")
    }

    fn photo(reference: &str) -> EntryMedia<'_> {
        EntryMedia {
            reference,
            file_name: "a.jpg",
            content_type: "image/jpeg",
            kind: MediaKind::Photo,
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let target = Target::new("1001", "super-secret-token");
        let debug = format!("{:?}", target);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(target.credential.expose(), "super-secret-token");
    }

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime_str("image/jpeg"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime_str("VIDEO/MP4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime_str("application/pdf"), None);
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(MediaType::mime_from_extension("JPG"), Some("image/jpeg"));
        assert_eq!(MediaType::mime_from_extension("mov"), Some("video/quicktime"));
        assert_eq!(MediaType::mime_from_extension("txt"), None);
    }

    #[test]
    fn test_media_kind_resolve() {
        assert_eq!(MediaKind::resolve(MediaType::Image, MediaKind::Reel), MediaKind::Photo);
        assert_eq!(MediaKind::resolve(MediaType::Video, MediaKind::Reel), MediaKind::Reel);
        assert_eq!(MediaKind::resolve(MediaType::Video, MediaKind::Video), MediaKind::Video);
        assert_eq!(MediaKind::resolve(MediaType::Video, MediaKind::Photo), MediaKind::Video);
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!("Reel".parse::<MediaKind>().unwrap(), MediaKind::Reel);
        assert!("story".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_entry_status_round_trip_strings() {
        for status in [EntryStatus::Pending, EntryStatus::Posted, EntryStatus::Failed] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_pending_entry_is_valid() {
        let entry = ScheduledEntry::pending("sub", &target(), Some("hi"), None, 100, Some(200));
        assert!(entry.validate().is_ok());
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.content_kind(), ContentKind::Text);
    }

    #[test]
    fn test_entry_without_content_is_invalid() {
        let entry = ScheduledEntry::pending("sub", &target(), Some("   "), None, 100, None);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_entry_kind_without_reference_is_invalid() {
        let mut entry = ScheduledEntry::pending("sub", &target(), Some("hi"), None, 100, None);
        entry.media_kind = Some(MediaKind::Photo);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_entry_delete_before_schedule_is_invalid() {
        let entry = ScheduledEntry::pending("sub", &target(), Some("hi"), None, 100, Some(100));
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_posted_entry() {
        let entry = ScheduledEntry::posted(
            "sub",
            &target(),
            None,
            Some(photo("/media/a.jpg")),
            "1001_55".to_string(),
            500,
            Some(900),
        );
        assert!(entry.validate().is_ok());
        assert_eq!(entry.status, EntryStatus::Posted);
        assert_eq!(entry.platform_content_id.as_deref(), Some("1001_55"));
        assert_eq!(entry.posted_at, Some(500));
        assert_eq!(entry.content_kind(), ContentKind::Media(MediaKind::Photo));
        assert_eq!(entry.media(), Some(photo("/media/a.jpg")));
    }

    #[test]
    fn test_entry_media_without_content_type_is_invalid() {
        let mut entry =
            ScheduledEntry::pending("sub", &target(), None, Some(photo("/media/a.jpg")), 100, None);
        entry.media_content_type = None;
        assert!(entry.validate().is_err());
        assert!(entry.media().is_none());
    }
}
