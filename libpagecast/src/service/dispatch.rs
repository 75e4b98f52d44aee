//! Dispatching of recorded entries
//!
//! Publishes pending entries once their time has come and deletes posted
//! content whose retention has run out. Both passes are driven by the
//! caller's clock (`now`, unix seconds) so `page-send` can poll them and
//! tests can run them at any point in time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::events::{Event, EventBus};
use crate::error::Result;
use crate::media::MediaStore;
use crate::platforms::{MediaSource, Platform, PublishRequest};
use crate::types::ScheduledEntry;
use crate::Database;

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub due: usize,
    pub published: usize,
    pub failed: usize,
    /// Stored media files removed because nothing pending needs them
    pub media_removed: usize,
}

#[derive(Clone)]
pub struct DispatchService {
    db: Arc<Database>,
    media: MediaStore,
    platform: Arc<dyn Platform>,
    event_bus: EventBus,
}

impl DispatchService {
    pub fn new(
        db: Arc<Database>,
        media: MediaStore,
        platform: Arc<dyn Platform>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            media,
            platform,
            event_bus,
        }
    }

    /// Publish every pending entry scheduled at or before `now`
    ///
    /// Each entry is published once and marked `posted` or `failed`; failed
    /// entries are not retried.
    ///
    /// # Errors
    ///
    /// Returns database errors. Publish failures are recorded on the entry
    /// instead.
    pub async fn dispatch_due(&self, now: i64) -> Result<DispatchReport> {
        let due = self.db.get_due_entries(now).await?;
        let mut report = DispatchReport {
            due: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            debug!("No entries due");
            return Ok(report);
        }

        info!("Dispatching {} due entr{}", due.len(), if due.len() == 1 { "y" } else { "ies" });

        for entry in &due {
            if self.dispatch_entry(entry).await? {
                report.published += 1;
            } else {
                report.failed += 1;
            }

            if let Some(reference) = &entry.media_reference {
                if self.db.count_pending_for_media(reference).await? == 0 {
                    match self.media.remove(reference).await {
                        Ok(()) => report.media_removed += 1,
                        Err(e) => warn!("Failed to remove stored media {}: {}", reference, e),
                    }
                }
            }
        }

        Ok(report)
    }

    /// Returns whether the entry was published
    async fn dispatch_entry(&self, entry: &ScheduledEntry) -> Result<bool> {
        let target = entry.target();
        let source = entry.media().map(MediaSource::from_entry_media);
        let request = PublishRequest {
            target: &target,
            kind: entry.content_kind(),
            message: entry.message.as_deref(),
            media: source.as_ref(),
        };
        let media = source.as_ref().map(|s| s.file_name.clone());

        match self.platform.publish(&request).await {
            Ok(content_id) => {
                info!("Published entry {} to page {}: {}", entry.id, entry.target_id, content_id);
                self.db
                    .mark_posted(&entry.id, &content_id, Utc::now().timestamp())
                    .await?;
                self.event_bus.emit(Event::PairPublished {
                    submission_id: entry.submission_id.clone(),
                    target_id: entry.target_id.clone(),
                    media,
                    content_id,
                });
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to publish entry {} to page {}: {}", entry.id, entry.target_id, e);
                self.db.mark_failed(&entry.id, &e.to_string()).await?;
                self.event_bus.emit(Event::PairFailed {
                    submission_id: entry.submission_id.clone(),
                    target_id: entry.target_id.clone(),
                    media,
                    error: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Delete platform content of posted entries whose `delete_at` has passed
    ///
    /// Returns how many entries were reaped. An entry whose delete fails
    /// stays unreaped and is tried again on the next pass.
    pub async fn reap_expired(&self, now: i64) -> Result<usize> {
        let expired = self.db.get_expired_entries(now).await?;
        let mut reaped = 0;

        for entry in &expired {
            let Some(content_id) = entry.platform_content_id.as_deref() else {
                continue;
            };

            match self
                .platform
                .delete_content(content_id, &entry.target_credential)
                .await
            {
                Ok(()) => {
                    self.db.mark_deleted(&entry.id, Utc::now().timestamp()).await?;
                    reaped += 1;
                    info!("Auto-deleted {} from page {}", content_id, entry.target_id);
                    self.event_bus.emit(Event::ItemDeleted {
                        target_id: entry.target_id.clone(),
                        content_id: content_id.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to auto-delete {} from page {}: {}",
                        content_id, entry.target_id, e
                    );
                }
            }
        }

        Ok(reaped)
    }
}
