//! Pagecast - publish and schedule content to managed pages
//!
//! This library provides the publishing and lifecycle scheduling engine:
//! planning a submission into per-page publish operations, executing them
//! against the Graph API, recording scheduled entries for later dispatch
//! and auto-deletion, and bulk-deleting existing page content.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod recorder;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{PagecastError, Result};
pub use media::{MediaStore, StoredMedia};
pub use recorder::LifecycleRecorder;
pub use types::{
    ContentKind, Credential, EntryMedia, EntryStatus, MediaKind, ScheduledEntry, Target,
};
