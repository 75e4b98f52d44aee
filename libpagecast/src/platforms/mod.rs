//! Platform abstraction and implementations
//!
//! A [`Platform`] publishes content to a page, walks a page's feed and
//! deletes content by id. Every call carries the credential of the page it
//! acts on; implementations keep no per-page state between calls.
//!
//! # Examples
//!
//! ```no_run
//! use libpagecast::config::GraphConfig;
//! use libpagecast::platforms::{graph::GraphClient, Platform, PublishRequest};
//! use libpagecast::types::{ContentKind, Target};
//!
//! # async fn example() -> libpagecast::error::Result<()> {
//! let client = GraphClient::new(&GraphConfig::default())?;
//! let target = Target::new("1234567890", "page-access-token");
//!
//! let request = PublishRequest {
//!     target: &target,
//!     kind: ContentKind::Text,
//!     message: Some("Opening at 9 tomorrow!"),
//!     media: None,
//! };
//! let post_id = client.publish(&request).await?;
//! println!("Published: {}", post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::media::StoredMedia;
use crate::types::{ContentKind, Credential, EntryMedia, Target};

pub mod graph;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// A media file on disk, ready to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
}

impl MediaSource {
    pub fn from_stored(stored: &StoredMedia) -> Self {
        Self {
            path: stored.path().to_path_buf(),
            file_name: stored.file_name.clone(),
            content_type: stored.content_type.clone(),
        }
    }

    /// Source for media recorded on an entry
    ///
    /// Uses the name and content type the file was uploaded with, not the
    /// stored file name.
    pub fn from_entry_media(media: EntryMedia<'_>) -> Self {
        Self {
            path: PathBuf::from(media.reference),
            file_name: media.file_name.to_string(),
            content_type: media.content_type.to_string(),
        }
    }
}

/// One publish call: a single piece of content for a single page
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub target: &'a Target,
    pub kind: ContentKind,
    /// Post text, or caption/description for media
    pub message: Option<&'a str>,
    /// Required for every kind except `ContentKind::Text`
    pub media: Option<&'a MediaSource>,
}

/// One page of a feed listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    /// Content ids on this page, in feed order
    pub items: Vec<String>,
    /// Opaque cursor for the next page, absent on the last page
    pub next: Option<String>,
}

/// Platform trait for page publishing and content removal
#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase identifier of the platform (e.g. "facebook")
    fn name(&self) -> &str;

    /// Publish content to the request's target page
    ///
    /// Returns the platform's id for the new content.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Validation` if the request is incomplete (e.g. a
    ///   media kind without a media file)
    /// - `PlatformError::Authentication` if the page credential is rejected
    /// - `PlatformError::RateLimit` if the platform throttles the call
    /// - `PlatformError::Network` for transport failures and server errors
    /// - `PlatformError::Posting` for any other rejection or a malformed
    ///   response
    async fn publish(&self, request: &PublishRequest<'_>) -> Result<String>;

    /// Fetch one page of content ids from a page's feed
    ///
    /// `cursor` is the `next` value of a previous [`FeedPage`]; `None`
    /// starts at the newest content.
    async fn feed_page(&self, target: &Target, cursor: Option<&str>, limit: u32) -> Result<FeedPage>;

    /// Delete a single piece of content
    async fn delete_content(&self, content_id: &str, credential: &Credential) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaKind, MediaType};

    #[test]
    fn test_media_source_from_entry_media() {
        let source = MediaSource::from_entry_media(EntryMedia {
            reference: "/srv/media/0af3_snapshot",
            file_name: "snapshot",
            content_type: "image/jpeg",
            kind: MediaKind::Photo,
        });
        assert_eq!(source.file_name, "snapshot");
        assert_eq!(source.content_type, "image/jpeg");
        assert_eq!(source.path, PathBuf::from("/srv/media/0af3_snapshot"));
    }

    #[test]
    fn test_media_source_from_stored() {
        let stored = StoredMedia {
            reference: "/srv/media/77_cat.png".to_string(),
            file_name: "cat.png".to_string(),
            content_type: "image/png".to_string(),
            media_type: MediaType::Image,
            size: 3,
            sha256: String::new(),
        };
        let source = MediaSource::from_stored(&stored);
        assert_eq!(source.file_name, "cat.png");
        assert_eq!(source.content_type, "image/png");
        assert_eq!(source.path, PathBuf::from("/srv/media/77_cat.png"));
    }
}
