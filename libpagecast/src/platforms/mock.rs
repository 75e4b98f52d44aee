//! Mock platform implementation for testing
//!
//! A configurable in-memory [`Platform`] that records every call. Publishes,
//! feed fetches and deletes can be made to fail for chosen pages or content
//! ids, and each page can be given a scripted feed.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{FeedPage, Platform, PublishRequest};
use crate::types::{ContentKind, Credential, Target};

/// A recorded publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub target_id: String,
    pub kind: ContentKind,
    pub message: Option<String>,
    pub media: Option<PathBuf>,
    /// Upload name and content type of the media, as sent
    pub upload: Option<(String, String)>,
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Pages whose publishes fail
    pub failing_targets: HashSet<String>,

    /// Error returned by failing publishes
    pub publish_error: PlatformError,

    /// Pages whose feed listing fails
    pub failing_feeds: HashSet<String>,

    /// Content ids whose deletion fails
    pub failing_deletes: HashSet<String>,

    /// Scripted feed per page, one inner vector per feed page
    pub feeds: HashMap<String, Vec<Vec<String>>>,

    /// Delay before completing each call (simulates network latency)
    pub delay: Duration,

    /// Publishes that were attempted (for verification)
    pub published: Arc<Mutex<Vec<PublishCall>>>,

    /// Delete calls that were made, successful or not
    pub delete_requests: Arc<Mutex<Vec<String>>>,

    /// Feed requests as (page id, cursor)
    pub feed_requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            failing_targets: HashSet::new(),
            publish_error: PlatformError::Posting("Mock publishing failed".to_string()),
            failing_feeds: HashSet::new(),
            failing_deletes: HashSet::new(),
            feeds: HashMap::new(),
            delay: Duration::from_millis(0),
            published: Arc::new(Mutex::new(Vec::new())),
            delete_requests: Arc::new(Mutex::new(Vec::new())),
            feed_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A platform on which everything succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Fail publishes to `target_id` with the configured publish error
    pub fn fail_publish_for(mut self, target_id: &str) -> Self {
        self.config.failing_targets.insert(target_id.to_string());
        self
    }

    /// Error returned by failing publishes
    pub fn with_publish_error(mut self, error: PlatformError) -> Self {
        self.config.publish_error = error;
        self
    }

    /// Fail every feed fetch for `target_id`
    pub fn fail_feed_for(mut self, target_id: &str) -> Self {
        self.config.failing_feeds.insert(target_id.to_string());
        self
    }

    /// Fail the deletion of `content_id`
    pub fn fail_delete_for(mut self, content_id: &str) -> Self {
        self.config.failing_deletes.insert(content_id.to_string());
        self
    }

    /// Script the feed of `target_id` as a sequence of pages
    pub fn with_feed(mut self, target_id: &str, pages: Vec<Vec<String>>) -> Self {
        self.config.feeds.insert(target_id.to_string(), pages);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Get every publish that was attempted
    pub fn published(&self) -> Vec<PublishCall> {
        self.config.published.lock().unwrap().clone()
    }

    pub fn publish_call_count(&self) -> usize {
        self.config.published.lock().unwrap().len()
    }

    /// Get every content id a delete was requested for
    pub fn delete_requests(&self) -> Vec<String> {
        self.config.delete_requests.lock().unwrap().clone()
    }

    pub fn feed_requests(&self) -> Vec<(String, Option<String>)> {
        self.config.feed_requests.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> Result<String> {
        let sequence = {
            let mut published = self.config.published.lock().unwrap();
            published.push(PublishCall {
                target_id: request.target.id.clone(),
                kind: request.kind,
                message: request.message.map(str::to_string),
                media: request.media.map(|m| m.path.clone()),
                upload: request
                    .media
                    .map(|m| (m.file_name.clone(), m.content_type.clone())),
            });
            published.len()
        };

        self.simulate_latency().await;

        if self.config.failing_targets.contains(&request.target.id) {
            return Err(self.config.publish_error.clone().into());
        }

        if request.kind != ContentKind::Text && request.media.is_none() {
            return Err(PlatformError::Validation("Media publish without a file".to_string()).into());
        }

        Ok(format!("{}_{}", request.target.id, sequence))
    }

    async fn feed_page(&self, target: &Target, cursor: Option<&str>, _limit: u32) -> Result<FeedPage> {
        self.config
            .feed_requests
            .lock()
            .unwrap()
            .push((target.id.clone(), cursor.map(str::to_string)));

        self.simulate_latency().await;

        if self.config.failing_feeds.contains(&target.id) {
            return Err(PlatformError::Network(format!(
                "Mock feed listing failed for {}",
                target.id
            ))
            .into());
        }

        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| {
                    PlatformError::Posting(format!("Mock feed got unknown cursor {}", cursor))
                })?,
        };

        let pages = self.config.feeds.get(&target.id);
        let items = pages
            .and_then(|p| p.get(index))
            .cloned()
            .unwrap_or_default();
        let next = pages
            .filter(|p| index + 1 < p.len())
            .map(|_| format!("page-{}", index + 1));

        Ok(FeedPage { items, next })
    }

    async fn delete_content(&self, content_id: &str, _credential: &Credential) -> Result<()> {
        self.config
            .delete_requests
            .lock()
            .unwrap()
            .push(content_id.to_string());

        self.simulate_latency().await;

        if self.config.failing_deletes.contains(content_id) {
            return Err(PlatformError::Posting(format!("Mock deletion of {} failed", content_id)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn text_request(target: &Target) -> PublishRequest<'_> {
        PublishRequest {
            target,
            kind: ContentKind::Text,
            message: Some("Test content"),
            media: None,
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let platform = MockPlatform::success("test");
        let target = Target::new("1001", "token");

        assert_eq!(platform.name(), "test");

        let first = platform.publish(&text_request(&target)).await.unwrap();
        let second = platform.publish(&text_request(&target)).await.unwrap();
        assert_eq!(first, "1001_1");
        assert_eq!(second, "1001_2");

        let published = platform.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].message.as_deref(), Some("Test content"));
        assert_eq!(published[0].kind, ContentKind::Text);
    }

    #[tokio::test]
    async fn test_mock_publish_failure_per_target() {
        let platform = MockPlatform::success("test")
            .fail_publish_for("1002")
            .with_publish_error(PlatformError::Authentication("token expired".to_string()));

        assert!(platform.publish(&text_request(&Target::new("1001", "a"))).await.is_ok());

        let err = platform
            .publish(&text_request(&Target::new("1002", "b")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token expired"));
        assert_eq!(platform.publish_call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_media_without_file_is_invalid() {
        let platform = MockPlatform::success("test");
        let target = Target::new("1001", "token");
        let request = PublishRequest {
            target: &target,
            kind: ContentKind::Media(MediaKind::Photo),
            message: None,
            media: None,
        };
        assert!(platform.publish(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_scripted_feed() {
        let platform = MockPlatform::success("test").with_feed(
            "1001",
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]],
        );
        let target = Target::new("1001", "token");

        let first = platform.feed_page(&target, None, 25).await.unwrap();
        assert_eq!(first.items, vec!["a", "b"]);
        assert_eq!(first.next.as_deref(), Some("page-1"));

        let second = platform
            .feed_page(&target, first.next.as_deref(), 25)
            .await
            .unwrap();
        assert_eq!(second.items, vec!["c"]);
        assert!(second.next.is_none());

        let empty = platform
            .feed_page(&Target::new("2002", "token"), None, 25)
            .await
            .unwrap();
        assert_eq!(empty, FeedPage::default());
    }

    #[tokio::test]
    async fn test_mock_failing_feed_and_delete() {
        let platform = MockPlatform::success("test")
            .fail_feed_for("1001")
            .fail_delete_for("x");
        let target = Target::new("1001", "token");

        assert!(platform.feed_page(&target, None, 25).await.is_err());
        assert!(platform.delete_content("x", &target.credential).await.is_err());
        assert!(platform.delete_content("y", &target.credential).await.is_ok());
        assert_eq!(platform.delete_requests(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let platform = MockPlatform::success("test").with_delay(Duration::from_millis(50));
        let target = Target::new("1001", "token");

        let start = std::time::Instant::now();
        platform.publish(&text_request(&target)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
