//! Live history over WebSocket.
//!
//! [`LiveHistory`] is a stream of full list snapshots. Each snapshot
//! replaces the previous one. A dropped connection is re-established with
//! exponential backoff until the subscription is dropped or the server
//! closes the feed (for example after sign-out).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use photopoet_core::creation::Creation;
use photopoet_core::history::{HistoryFilter, LiveFeedMessage};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::ClientError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const LIVE_PATH: &str = "/creations/live";

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to `max_delay`.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// A subscription to the identity's history.
///
/// Dropping it closes the connection.
pub struct LiveHistory {
    snapshots: watch::Receiver<Option<Vec<Creation>>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LiveHistory {
    /// Connect and wait for the first snapshot.
    pub(crate) async fn connect(
        api: Arc<ApiClient>,
        reconnect: ReconnectConfig,
    ) -> Result<Self, ClientError> {
        let socket = open(&api).await?;
        let (tx, mut snapshots) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(api, socket, tx, reconnect, cancel.clone()));

        if snapshots.wait_for(Option::is_some).await.is_err() {
            cancel.cancel();
            return Err(ClientError::Connection(
                "Live history closed before the first snapshot".into(),
            ));
        }
        Ok(Self {
            snapshots,
            cancel,
            task,
        })
    }

    /// The latest snapshot.
    pub fn latest(&self) -> Vec<Creation> {
        self.snapshots.borrow().clone().unwrap_or_default()
    }

    /// The latest snapshot narrowed by `filter`. The snapshot itself is
    /// left untouched.
    pub fn filtered(&self, filter: &HistoryFilter) -> Vec<Creation> {
        let snapshot = self.snapshots.borrow();
        let items = snapshot.as_deref().unwrap_or_default();
        filter.apply(items).into_iter().cloned().collect()
    }

    /// Wait for the next snapshot. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Vec<Creation>> {
        self.snapshots.changed().await.ok()?;
        self.snapshots.borrow_and_update().clone()
    }

    /// Whether the feed has ended.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the connection.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for LiveHistory {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn open(api: &ApiClient) -> Result<Socket, ClientError> {
    let token = api
        .fresh_access_token()
        .await
        .ok_or(ClientError::NotSignedIn)?;
    let url = format!("{}?access_token={token}", api.config().ws_url(LIVE_PATH)?);
    let (socket, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| ClientError::Connection(format!("Failed to open live history: {e}")))?;
    tracing::debug!("Live history connected");
    Ok(socket)
}

/// How a connection ended.
enum Ended {
    /// The server closed the feed or the subscriber went away.
    Finished,
    /// The transport failed; try again.
    Dropped,
}

async fn run(
    api: Arc<ApiClient>,
    mut socket: Socket,
    tx: watch::Sender<Option<Vec<Creation>>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    loop {
        match pump(&mut socket, &tx, &cancel).await {
            Ended::Finished => break,
            Ended::Dropped => {
                let Some(next) = reconnect_loop(&api, &reconnect, &cancel).await else {
                    break;
                };
                socket = next;
            }
        }
    }
    let _ = socket.close(None).await;
    tracing::debug!("Live history ended");
}

/// Forward snapshots until the connection ends.
async fn pump(
    socket: &mut Socket,
    tx: &watch::Sender<Option<Vec<Creation>>>,
    cancel: &CancellationToken,
) -> Ended {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return Ended::Finished,
            message = socket.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<LiveFeedMessage>(&text) {
                Ok(LiveFeedMessage::Snapshot { items }) => {
                    if tx.send(Some(items)).is_err() {
                        return Ended::Finished;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable live history message");
                }
            },
            Some(Ok(Message::Close(_))) => return Ended::Finished,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Live history connection lost");
                return Ended::Dropped;
            }
            None => return Ended::Dropped,
        }
    }
}

/// Reconnect with exponential backoff. `None` if cancelled first.
async fn reconnect_loop(
    api: &ApiClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<Socket> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = open(api) => match result {
                Ok(socket) => {
                    tracing::info!(attempt, "Live history reconnected");
                    return Some(socket);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Live history reconnect failed");
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
