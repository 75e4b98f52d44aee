//! Service layer for Pagecast
//!
//! `PagecastService` is the entry point used by the binaries. It owns the
//! shared resources (database, media store, platform client, event bus)
//! and hands out the specialised services:
//!
//! - `PublishingService`: validate, plan and publish or schedule submissions
//! - `PurgeService`: bulk deletion of existing page content
//! - `DispatchService`: publish due entries, reap expired content
//! - `EventBus`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use libpagecast::service::PagecastService;
//! use libpagecast::service::publishing::Submission;
//! use libpagecast::types::MediaKind;
//!
//! # async fn example() -> libpagecast::Result<()> {
//! let service = PagecastService::new().await?;
//! let targets = service.config().select_targets(&["Bakery".to_string()])?;
//!
//! let outcome = service
//!     .publishing()
//!     .submit(Submission {
//!         message: Some("Fresh bread at 7!".to_string()),
//!         targets,
//!         media: vec![],
//!         video_kind: MediaKind::Video,
//!         timing: None,
//!         retention_days: None,
//!     })
//!     .await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod events;
pub mod publishing;
pub mod purge;

pub use dispatch::{DispatchReport, DispatchService};
pub use publishing::{PublishingService, Submission, SubmissionOutcome};
pub use purge::{PurgeReport, PurgeService};

use self::events::EventBus;
use crate::media::MediaStore;
use crate::platforms::graph::GraphClient;
use crate::platforms::Platform;
use crate::{Config, Database, Result};
use std::sync::Arc;

/// Main service facade
///
/// All sub-services share the same `Arc<Database>`, media store, platform
/// client and event bus.
pub struct PagecastService {
    db: Arc<Database>,
    config: Config,
    publishing: PublishingService,
    purge: PurgeService,
    dispatch: DispatchService,
    event_bus: EventBus,
}

impl PagecastService {
    /// Load the default configuration and talk to the Graph API
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Build the service from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database can't be opened or migrated, the
    /// media directory can't be created or the HTTP client can't be built.
    pub async fn from_config(config: Config) -> Result<Self> {
        let platform = Arc::new(GraphClient::new(&config.graph)?);
        Self::with_platform(config, platform).await
    }

    /// Build the service on top of any platform implementation
    pub async fn with_platform(config: Config, platform: Arc<dyn Platform>) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);
        let media = MediaStore::new(&config.media.dir)?;
        let event_bus = EventBus::new(100);

        let publishing = PublishingService::new(
            Arc::clone(&db),
            media.clone(),
            Arc::clone(&platform),
            config.pacing.clone(),
            event_bus.clone(),
        );
        let purge = PurgeService::new(Arc::clone(&platform), &config.pacing, event_bus.clone());
        let dispatch = DispatchService::new(
            Arc::clone(&db),
            media,
            Arc::clone(&platform),
            event_bus.clone(),
        );

        Ok(Self {
            db,
            config,
            publishing,
            purge,
            dispatch,
            event_bus,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn publishing(&self) -> &PublishingService {
        &self.publishing
    }

    pub fn purge(&self) -> &PurgeService {
        &self.purge
    }

    pub fn dispatch(&self) -> &DispatchService {
        &self.dispatch
    }

    /// Subscribe to service events
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> events::EventReceiver {
        self.event_bus.subscribe()
    }
}
