//! Event system for progress tracking
//!
//! An in-process bus built on `tokio::sync::broadcast`. Services emit
//! events while a submission or purge runs; any number of subscribers
//! (the `--progress` printer, tests) can listen. Emitting never blocks and
//! events are simply dropped when nobody is subscribed.
//!
//! # Example
//!
//! ```no_run
//! use libpagecast::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::ItemDeleted {
//!     target_id: "1001".to_string(),
//!     content_id: "1001_42".to_string(),
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::purge::PurgeReport;

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

/// Event bus for distributing progress events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    ///
    /// A lagging subscriber loses the oldest events first.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Events emitted by services during operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A submission passed validation and is about to run
    SubmissionStarted {
        submission_id: String,
        /// "immediate" or "deferred"
        mode: String,
        targets: Vec<String>,
        media_count: usize,
    },

    /// One (content, target) pair was accepted by the platform
    PairPublished {
        submission_id: String,
        target_id: String,
        /// Original file name of the media item, if any
        media: Option<String>,
        content_id: String,
    },

    /// One (content, target) pair failed
    PairFailed {
        submission_id: String,
        target_id: String,
        media: Option<String>,
        error: String,
    },

    /// Waiting between media items
    Pacing { submission_id: String, seconds: u64 },

    /// A deferred submission's entries were committed
    EntriesScheduled {
        submission_id: String,
        count: usize,
        /// Unix timestamps of the earliest and latest entry
        first_at: i64,
        last_at: i64,
    },

    /// A bulk deletion removed one piece of content
    ItemDeleted { target_id: String, content_id: String },

    /// A bulk deletion finished
    PurgeCompleted { report: PurgeReport },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::SubmissionStarted {
                mode,
                targets,
                media_count,
                ..
            } => write!(
                f,
                "Starting {} submission: {} media item(s) to {} page(s)",
                mode,
                media_count,
                targets.len()
            ),
            Event::PairPublished {
                target_id,
                media,
                content_id,
                ..
            } => match media {
                Some(media) => write!(f, "✓ {} -> page {} ({})", media, target_id, content_id),
                None => write!(f, "✓ text -> page {} ({})", target_id, content_id),
            },
            Event::PairFailed {
                target_id,
                media,
                error,
                ..
            } => write!(
                f,
                "✗ {} -> page {}: {}",
                media.as_deref().unwrap_or("text"),
                target_id,
                error
            ),
            Event::Pacing { seconds, .. } => write!(f, "Waiting {}s before the next item", seconds),
            Event::EntriesScheduled {
                count,
                first_at,
                last_at,
                ..
            } => write!(
                f,
                "Scheduled {} entr{} between {} and {}",
                count,
                if *count == 1 { "y" } else { "ies" },
                format_timestamp(*first_at),
                format_timestamp(*last_at)
            ),
            Event::ItemDeleted {
                target_id,
                content_id,
            } => write!(f, "Deleted {} from page {}", content_id, target_id),
            Event::PurgeCompleted { report } => write!(
                f,
                "Purge finished: {} deleted, {} failed across {} page(s)",
                report.deleted, report.failed, report.targets
            ),
        }
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
