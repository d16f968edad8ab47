//! Photo-to-poem composer.
//!
//! Holds the attempt state of this client. Only one attempt runs at a time;
//! a second submit while one is in flight is refused locally, the same way
//! a disabled submit control would refuse it. While the request runs, the
//! server's progress (`analyzing` then `composing`) is mirrored into the
//! local state.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use photopoet_core::attempt::{AttemptState, GENERIC_FAILURE_MESSAGE, MISSING_PHOTO_MESSAGE};
use photopoet_core::style::PoemStyle;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::session::SessionProvider;

/// How often server-side progress is polled during an attempt.
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A photo ready to upload.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a photo from disk, guessing its type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo")
            .to_string();
        let mime_type = mime_for(&file_name).to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// A composed poem with the analysis it came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Generation {
    pub poem: String,
    pub style: PoemStyle,
    pub themes: String,
    pub emotions: String,
    pub photo_file_name: String,
}

/// Runs generation attempts for one client.
pub struct Composer {
    api: Arc<ApiClient>,
    session: Arc<SessionProvider>,
    state: watch::Sender<AttemptState>,
}

impl Composer {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionProvider>) -> Self {
        let (state, _) = watch::channel(AttemptState::default());
        Self {
            api,
            session,
            state,
        }
    }

    pub fn current(&self) -> AttemptState {
        self.state.borrow().clone()
    }

    /// State changes of this client's attempts.
    pub fn subscribe(&self) -> watch::Receiver<AttemptState> {
        self.state.subscribe()
    }

    /// Whether a new attempt would be refused.
    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    /// Run one attempt.
    ///
    /// A missing photo is reported without contacting the server. On
    /// failure the state returns to idle carrying the one message to show;
    /// the previous poem is never kept.
    pub async fn submit(
        &self,
        photo: Option<PhotoUpload>,
        style: PoemStyle,
    ) -> Result<Generation, ClientError> {
        self.session.identity()?;
        let Some(photo) = photo else {
            self.state.send_if_modified(|state| {
                if state.is_in_flight() {
                    return false;
                }
                *state = AttemptState::Idle {
                    last_error: Some(MISSING_PHOTO_MESSAGE.to_string()),
                };
                true
            });
            return Err(ClientError::MissingPhoto);
        };
        let form = Form::new()
            .text("style", style.label())
            .part("photo", photo_part(photo)?);
        let attempt = self.begin(style)?;

        let request = self.api.post_multipart::<Generation>("/generations", form);
        tokio::pin!(request);
        let mut poll = tokio::time::interval(PROGRESS_POLL_INTERVAL);
        poll.tick().await;

        let result = loop {
            tokio::select! {
                result = &mut request => break result,
                _ = poll.tick() => self.mirror_progress().await,
            }
        };

        match result {
            Ok(generation) => {
                tracing::info!(style = %generation.style, "Poem generated");
                attempt.finish(AttemptState::Done {
                    style: generation.style,
                    poem: generation.poem.clone(),
                });
                Ok(generation)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Poem generation failed");
                attempt.finish(AttemptState::Idle {
                    last_error: Some(e.user_message()),
                });
                Err(e)
            }
        }
    }

    /// Move to `Analyzing`, unless an attempt is already running.
    fn begin(&self, style: PoemStyle) -> Result<InFlight<'_>, ClientError> {
        let mut refused = false;
        self.state.send_if_modified(|state| match state.begin(style) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(_) => {
                refused = true;
                false
            }
        });
        if refused {
            return Err(ClientError::AttemptInFlight);
        }
        Ok(InFlight {
            state: &self.state,
            finished: false,
        })
    }

    /// Copy the server's `composing` step into the local state.
    async fn mirror_progress(&self) {
        let remote: AttemptState = match self.api.get_json("/generations/current").await {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "Progress poll failed");
                return;
            }
        };
        if let AttemptState::Composing { .. } = remote {
            self.state.send_if_modified(|state| match state.analyzed() {
                Ok(next) => {
                    *state = next;
                    true
                }
                Err(_) => false,
            });
        }
    }
}

/// The running attempt of a [`Composer`].
///
/// Dropped without [`InFlight::finish`] (the caller abandoned `submit`), it
/// returns the state to idle so the composer accepts the next attempt.
struct InFlight<'a> {
    state: &'a watch::Sender<AttemptState>,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: AttemptState) {
        self.finished = true;
        self.state.send_replace(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!("Poem generation abandoned");
        self.state.send_if_modified(|state| {
            if !state.is_in_flight() {
                return false;
            }
            *state = AttemptState::Idle {
                last_error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
            };
            true
        });
    }
}

fn photo_part(photo: PhotoUpload) -> Result<Part, ClientError> {
    Part::bytes(photo.bytes)
        .file_name(photo.file_name)
        .mime_str(&photo.mime_type)
        .map_err(ClientError::Request)
}

/// Image MIME type implied by a filename extension.
fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
