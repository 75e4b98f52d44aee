//! Submission handling
//!
//! A submission is validated, its media is saved to the media store, and
//! the planner decides between two paths:
//!
//! - **immediate**: each media item (or the text post) is published to
//!   every target right away, with a random pacing delay between items;
//! - **deferred**: one pending entry per (media item, target) is recorded
//!   in a single transaction for the dispatcher to publish later.
//!
//! Per-pair failures never abort the rest of an immediate submission.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{Event, EventBus};
use crate::config::PacingConfig;
use crate::error::{PlatformError, Result};
use crate::media::{MediaBlob, MediaStore, StoredMedia};
use crate::platforms::{MediaSource, Platform, PublishRequest};
use crate::recorder::LifecycleRecorder;
use crate::scheduling::{
    normalize_message, pacing_delay, plan, validate_submission, ExecutionPlan, MediaItem,
    PlanRequest, PlannedEntry, PublishStep, Timing,
};
use crate::types::{ContentKind, MediaKind, ScheduledEntry, Target};
use crate::Database;

/// One publish-or-schedule request
#[derive(Debug, Clone)]
pub struct Submission {
    pub message: Option<String>,
    pub targets: Vec<Target>,
    pub media: Vec<MediaBlob>,
    /// How videos are published; images are always photos
    pub video_kind: MediaKind,
    /// `None` publishes immediately
    pub timing: Option<Timing>,
    /// Delete published content after this many days
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    Immediate,
    Deferred,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
        }
    }
}

/// Result of publishing one (content, target) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairResult {
    pub target_id: String,
    /// Original file name of the media item, `None` for text posts
    pub media: Option<String>,
    pub kind: String,
    pub success: bool,
    pub content_id: Option<String>,
    pub error: Option<String>,
}

/// An entry recorded for later dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPair {
    pub entry_id: String,
    pub target_id: String,
    pub media: Option<String>,
    pub kind: String,
    pub scheduled_at: i64,
    pub delete_at: Option<i64>,
}

/// What a submission did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub submission_id: String,
    pub mode: SubmissionMode,
    pub published: usize,
    pub failed: usize,
    pub scheduled: usize,
    pub results: Vec<PairResult>,
    pub entries: Vec<ScheduledPair>,
    /// Human-readable one-line summary
    pub summary: String,
}

fn kind_label(kind: ContentKind) -> String {
    match kind {
        ContentKind::Text => "text".to_string(),
        ContentKind::Media(kind) => kind.to_string(),
    }
}

/// Publishing service
#[derive(Clone)]
pub struct PublishingService {
    db: Arc<Database>,
    media: MediaStore,
    platform: Arc<dyn Platform>,
    pacing: PacingConfig,
    event_bus: EventBus,
}

impl PublishingService {
    pub fn new(
        db: Arc<Database>,
        media: MediaStore,
        platform: Arc<dyn Platform>,
        pacing: PacingConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            media,
            platform,
            pacing,
            event_bus,
        }
    }

    /// Publish or schedule a submission
    ///
    /// # Errors
    ///
    /// - `PagecastError::InvalidInput` when the submission is rejected by
    ///   validation; nothing has been stored or sent at that point
    /// - media store errors while saving uploads
    /// - `PlatformError::Posting` when an immediate submission publishes
    ///   nothing at all
    /// - database errors when a deferred submission can't be recorded; the
    ///   media saved for it is removed again
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome> {
        let retention = submission
            .retention_days
            .map(|days| Duration::days(i64::from(days)));

        validate_submission(
            submission.message.as_deref(),
            submission.media.len(),
            submission.targets.len(),
            submission.timing.as_ref(),
            retention,
        )?;

        // Reject unsupported uploads before anything is written
        let kinds = submission
            .media
            .iter()
            .map(|blob| Ok(MediaKind::resolve(blob.media_type()?, submission.video_kind)))
            .collect::<Result<Vec<_>>>()?;

        let submission_id = Uuid::new_v4().to_string();
        let mode = if submission.timing.is_some() {
            SubmissionMode::Deferred
        } else {
            SubmissionMode::Immediate
        };

        info!(
            "Submission {}: {} with {} media item(s) to {} page(s)",
            submission_id,
            mode.as_str(),
            submission.media.len(),
            submission.targets.len()
        );
        self.event_bus.emit(Event::SubmissionStarted {
            submission_id: submission_id.clone(),
            mode: mode.as_str().to_string(),
            targets: submission.targets.iter().map(|t| t.id.clone()).collect(),
            media_count: submission.media.len(),
        });

        let items = self.save_media(&submission.media, &kinds).await?;

        let request = PlanRequest {
            message: submission.message.as_deref(),
            media: &items,
            targets: &submission.targets,
            timing: submission.timing.as_ref(),
            retention,
        };

        let planned = plan(&request, &mut rand::thread_rng());
        let execution = match planned {
            Ok(execution) => execution,
            Err(e) => {
                self.discard_media(items.iter().map(|i| &i.stored)).await;
                return Err(e);
            }
        };

        match execution {
            ExecutionPlan::Immediate(steps) => {
                self.publish_now(&submission_id, request.message, &steps, retention)
                    .await
            }
            ExecutionPlan::Deferred(entries) => {
                let result = self.record_deferred(&submission_id, &entries).await;
                if result.is_err() {
                    self.discard_media(items.iter().map(|i| &i.stored)).await;
                }
                result
            }
        }
    }

    async fn save_media(&self, blobs: &[MediaBlob], kinds: &[MediaKind]) -> Result<Vec<MediaItem>> {
        let mut items: Vec<MediaItem> = Vec::with_capacity(blobs.len());

        for (blob, kind) in blobs.iter().zip(kinds) {
            match self.media.save(blob).await {
                Ok(stored) => items.push(MediaItem {
                    stored,
                    kind: *kind,
                }),
                Err(e) => {
                    self.discard_media(items.iter().map(|i| &i.stored)).await;
                    return Err(e);
                }
            }
        }

        Ok(items)
    }

    async fn discard_media<'a>(&self, stored: impl Iterator<Item = &'a StoredMedia>) {
        for media in stored {
            if let Err(e) = self.media.remove(&media.reference).await {
                warn!("Failed to remove stored media {}: {}", media.reference, e);
            }
        }
    }

    async fn publish_now(
        &self,
        submission_id: &str,
        message: Option<&str>,
        steps: &[PublishStep<'_>],
        retention: Option<Duration>,
    ) -> Result<SubmissionOutcome> {
        let message = normalize_message(message);
        let mut results = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            if index > 0 {
                let delay = pacing_delay(
                    self.pacing.publish_min_secs,
                    self.pacing.publish_max_secs,
                    &mut rand::thread_rng(),
                );
                debug!("Pacing {}s before the next media item", delay.as_secs());
                self.event_bus.emit(Event::Pacing {
                    submission_id: submission_id.to_string(),
                    seconds: delay.as_secs(),
                });
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }

            let source = step.media.map(|item| MediaSource::from_stored(&item.stored));
            let kind = ContentKind::from(step.media.map(|item| item.kind));
            let media_name = step.media.map(|item| item.stored.file_name.clone());

            for target in step.targets {
                let request = PublishRequest {
                    target,
                    kind,
                    message,
                    media: source.as_ref(),
                };

                let result = match self.platform.publish(&request).await {
                    Ok(content_id) => {
                        info!(
                            "Published {} to page {}: {}",
                            kind_label(kind),
                            target.id,
                            content_id
                        );
                        if let Some(retention) = retention {
                            self.record_published(
                                submission_id,
                                target,
                                message,
                                step.media,
                                &content_id,
                                retention,
                            )
                            .await;
                        }
                        self.event_bus.emit(Event::PairPublished {
                            submission_id: submission_id.to_string(),
                            target_id: target.id.clone(),
                            media: media_name.clone(),
                            content_id: content_id.clone(),
                        });
                        PairResult {
                            target_id: target.id.clone(),
                            media: media_name.clone(),
                            kind: kind_label(kind),
                            success: true,
                            content_id: Some(content_id),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Failed to publish {} to page {}: {}",
                            kind_label(kind),
                            target.id,
                            e
                        );
                        self.event_bus.emit(Event::PairFailed {
                            submission_id: submission_id.to_string(),
                            target_id: target.id.clone(),
                            media: media_name.clone(),
                            error: e.to_string(),
                        });
                        PairResult {
                            target_id: target.id.clone(),
                            media: media_name.clone(),
                            kind: kind_label(kind),
                            success: false,
                            content_id: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                results.push(result);
            }

            if let Some(item) = step.media {
                self.discard_media(std::iter::once(&item.stored)).await;
            }
        }

        let published = results.iter().filter(|r| r.success).count();
        let failed = results.len() - published;
        let page_count = steps.first().map(|s| s.targets.len()).unwrap_or(0);

        if published == 0 {
            return Err(PlatformError::Posting(format!(
                "Failed to publish to any of the {} selected page(s)",
                page_count
            ))
            .into());
        }

        let mut summary = format!(
            "Published {} of {} post(s) to {} page(s)",
            published,
            results.len(),
            page_count
        );
        if failed > 0 {
            summary.push_str(&format!(", {} failed", failed));
        }

        Ok(SubmissionOutcome {
            submission_id: submission_id.to_string(),
            mode: SubmissionMode::Immediate,
            published,
            failed,
            scheduled: 0,
            results,
            entries: Vec::new(),
            summary,
        })
    }

    /// Record a published pair so the dispatcher can delete it later
    async fn record_published(
        &self,
        submission_id: &str,
        target: &Target,
        message: Option<&str>,
        media: Option<&MediaItem>,
        content_id: &str,
        retention: Duration,
    ) {
        let now = Utc::now().timestamp();
        let entry = ScheduledEntry::posted(
            submission_id,
            target,
            message,
            media.map(|item| item.stored.entry_media(item.kind)),
            content_id.to_string(),
            now,
            Some(now + retention.num_seconds()),
        );

        let mut recorder = LifecycleRecorder::new(&self.db);
        let result = match recorder.create(entry) {
            Ok(_) => recorder.commit().await.map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(
                "Published {} to page {} but could not record it for auto-delete: {}",
                content_id, target.id, e
            );
        }
    }

    async fn record_deferred(
        &self,
        submission_id: &str,
        planned: &[PlannedEntry<'_>],
    ) -> Result<SubmissionOutcome> {
        let mut recorder = LifecycleRecorder::new(&self.db);
        let mut entries = Vec::with_capacity(planned.len());

        for item in planned {
            let kind = ContentKind::from(item.media.map(|m| m.kind));
            let entry = ScheduledEntry::pending(
                submission_id,
                item.target,
                item.message,
                item.media.map(|m| m.stored.entry_media(m.kind)),
                item.scheduled_time.timestamp(),
                item.delete_time.map(|t| t.timestamp()),
            );
            let scheduled = ScheduledPair {
                entry_id: entry.id.clone(),
                target_id: entry.target_id.clone(),
                media: item.media.map(|m| m.stored.file_name.clone()),
                kind: kind_label(kind),
                scheduled_at: entry.scheduled_at,
                delete_at: entry.delete_at,
            };

            recorder.create(entry)?;
            entries.push(scheduled);
        }

        let count = recorder.commit().await?;

        let first_at = entries.iter().map(|e| e.scheduled_at).min().unwrap_or_default();
        let last_at = entries.iter().map(|e| e.scheduled_at).max().unwrap_or_default();
        let page_count = {
            let mut ids: Vec<&str> = entries.iter().map(|e| e.target_id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };

        info!("Submission {}: scheduled {} entries", submission_id, count);
        self.event_bus.emit(Event::EntriesScheduled {
            submission_id: submission_id.to_string(),
            count,
            first_at,
            last_at,
        });

        let first = chrono::DateTime::from_timestamp(first_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| first_at.to_string());

        Ok(SubmissionOutcome {
            submission_id: submission_id.to_string(),
            mode: SubmissionMode::Deferred,
            published: 0,
            failed: 0,
            scheduled: count,
            results: Vec::new(),
            entries,
            summary: format!(
                "Scheduled {} post(s) to {} page(s), first at {}",
                count, page_count, first
            ),
        })
    }
}
