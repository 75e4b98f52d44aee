//! Bulk deletion of existing page content
//!
//! Walks each page's feed one page at a time and deletes every item it
//! sees. Nothing here escalates: a failed delete is counted and skipped, a
//! failed feed fetch ends the walk for that page only.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::events::{Event, EventBus};
use crate::config::PacingConfig;
use crate::platforms::Platform;
use crate::types::Target;

/// Outcome of a bulk deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Delete calls issued
    pub attempted: usize,
    /// Delete calls that succeeded
    pub deleted: usize,
    /// Delete calls that failed
    pub failed: usize,
    /// Pages walked
    pub targets: usize,
}

impl PurgeReport {
    pub fn summary(&self) -> String {
        format!(
            "Deleted {} of {} item(s) across {} page(s){}",
            self.deleted,
            self.attempted,
            self.targets,
            if self.failed > 0 {
                format!(", {} failed", self.failed)
            } else {
                String::new()
            }
        )
    }
}

/// Bulk deletion service
#[derive(Clone)]
pub struct PurgeService {
    platform: Arc<dyn Platform>,
    page_size: u32,
    delete_delay: Duration,
    event_bus: EventBus,
}

impl PurgeService {
    pub fn new(platform: Arc<dyn Platform>, pacing: &PacingConfig, event_bus: EventBus) -> Self {
        Self {
            platform,
            page_size: pacing.page_size(),
            delete_delay: pacing.delete_delay(),
            event_bus,
        }
    }

    /// Delete every feed item of every target
    ///
    /// Targets are walked in order. Each successful delete is followed by
    /// the configured delay; failures are logged and skipped.
    pub async fn delete_all(&self, targets: &[Target]) -> PurgeReport {
        let mut report = PurgeReport::default();

        for target in targets {
            report.targets += 1;
            self.purge_target(target, &mut report).await;
        }

        info!("{}", report.summary());
        self.event_bus.emit(Event::PurgeCompleted { report });
        report
    }

    async fn purge_target(&self, target: &Target, report: &mut PurgeReport) {
        let mut cursor: Option<String> = None;

        loop {
            let page = match self
                .platform
                .feed_page(target, cursor.as_deref(), self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Stopping deletion for page {}: feed listing failed: {}", target.id, e);
                    return;
                }
            };

            if page.items.is_empty() {
                debug!("Feed of page {} exhausted", target.id);
                return;
            }

            for content_id in &page.items {
                report.attempted += 1;

                match self
                    .platform
                    .delete_content(content_id, &target.credential)
                    .await
                {
                    Ok(()) => {
                        report.deleted += 1;
                        debug!("Deleted {} from page {}", content_id, target.id);
                        self.event_bus.emit(Event::ItemDeleted {
                            target_id: target.id.clone(),
                            content_id: content_id.clone(),
                        });
                        if !self.delete_delay.is_zero() {
                            sleep(self.delete_delay).await;
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!("Failed to delete {} from page {}: {}", content_id, target.id, e);
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => return,
            }
        }
    }
}
