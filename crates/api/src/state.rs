use std::sync::Arc;

use photopoet_ai::{PoemGenerator, ThemeExtractor};
use photopoet_db::{CreationStore, IdentityStore};
use photopoet_events::{EventBus, Mailer};
use photopoet_pipeline::{HistoryAccessor, Orchestrator};
use photopoet_storage::BlobStore;

use crate::config::ServerConfig;

/// External collaborators the server is wired to.
///
/// `main.rs` picks Postgres or in-memory stores and the hosted model;
/// integration tests pass in-memory stores and stub models.
pub struct Backends {
    pub creations: Arc<dyn CreationStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub extractor: Arc<dyn ThemeExtractor>,
    pub generator: Arc<dyn PoemGenerator>,
    pub mailer: Arc<dyn Mailer>,
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Creation records. Handlers go through `history` for owner checks;
    /// direct access is for health checks.
    pub creations: Arc<dyn CreationStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub history: Arc<HistoryAccessor>,
    /// Centralized event bus for creation and identity changes.
    pub event_bus: Arc<EventBus>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Assemble the pipeline services around `backends`.
    pub fn new(config: ServerConfig, backends: Backends) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let orchestrator = Orchestrator::new(
            backends.extractor,
            backends.generator,
            Arc::clone(&backends.creations),
            Arc::clone(&backends.blobs),
            Arc::clone(&event_bus),
        );
        let history = HistoryAccessor::new(
            Arc::clone(&backends.creations),
            backends.blobs,
            Arc::clone(&event_bus),
        );
        Self {
            config: Arc::new(config),
            creations: backends.creations,
            identities: backends.identities,
            orchestrator: Arc::new(orchestrator),
            history: Arc::new(history),
            event_bus,
            mailer: backends.mailer,
        }
    }
}
