//! Async client for the Photo Poet API.
//!
//! One [`PhotoPoetClient`] stands for one UI instance:
//!
//! - [`SessionProvider`] -- current identity, loading flag, and an
//!   identity-changed stream. Establishes an anonymous identity when there
//!   is no session.
//! - [`Composer`] -- one photo-to-poem attempt at a time, with its state.
//! - [`HistoryClient`] -- the identity's saved creations, export and share.
//! - [`LiveHistory`] -- a stream of history snapshots over WebSocket.

use std::sync::Arc;

pub mod api;
pub mod composer;
pub mod config;
pub mod error;
pub mod history;
pub mod live;
pub mod session;

pub use api::ApiClient;
pub use composer::{Composer, Generation, PhotoUpload};
pub use config::ClientConfig;
pub use error::ClientError;
pub use history::{Download, HistoryClient, ShareLink, SharedCreation};
pub use live::{LiveHistory, ReconnectConfig};
pub use session::{SessionProvider, SessionState};

/// All client services sharing one session.
#[derive(Clone)]
pub struct PhotoPoetClient {
    pub session: Arc<SessionProvider>,
    pub composer: Arc<Composer>,
    pub history: Arc<HistoryClient>,
}

impl PhotoPoetClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(ApiClient::new(config)?);
        let session = Arc::new(SessionProvider::new(Arc::clone(&api)));
        Ok(Self {
            composer: Arc::new(Composer::new(Arc::clone(&api), Arc::clone(&session))),
            history: Arc::new(HistoryClient::new(api, Arc::clone(&session))),
            session,
        })
    }

    /// Establish the session. Call once at startup before anything
    /// identity-scoped.
    pub async fn start(&self) -> Result<(), ClientError> {
        self.session.initialize().await.map(|_| ())
    }
}
