use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use photopoet_core::error::CoreError;
use photopoet_core::history::{HistoryFilter, HistoryView, LiveFeedMessage};
use photopoet_core::types::DbId;
use photopoet_events::{AppEvent, IdentityChange};
use tokio::sync::broadcast::error::RecvError;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

type WsSink = SplitSink<WebSocket, Message>;

/// GET /api/v1/creations/live
///
/// Upgrades to a WebSocket streaming `snapshot` messages of the caller's
/// history.
pub async fn live_history(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth_user.user_id))
}

/// Serve one subscriber until it disconnects, signs out, or the bus closes.
///
/// Events are folded into a [`HistoryView`], so out-of-order deliveries keep
/// the latest write per record. A lagging subscriber is resynced from the
/// store.
async fn handle_socket(socket: WebSocket, state: AppState, owner_id: DbId) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(%conn_id, user_id = owner_id, "Live history connected");

    // Subscribe before the first read so no change falls between the two.
    let mut events = state.event_bus.subscribe();
    let (mut sink, mut stream) = socket.split();
    let mut view = HistoryView::new();

    if let Err(e) = resync(&state, owner_id, &mut view).await {
        tracing::error!(%conn_id, error = %e, "Initial history load failed");
        let _ = sink.send(Message::Close(None)).await;
        return;
    }
    if send_snapshot(&mut sink, &view).await.is_err() {
        return;
    }

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.owner_id() == owner_id => {
                    if ends_session(&event) {
                        tracing::info!(%conn_id, user_id = owner_id, "Identity signed out, closing feed");
                        break;
                    }
                    let Some(change) = event.history_change() else { continue };
                    if view.apply(change) && send_snapshot(&mut sink, &view).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%conn_id, skipped, "Live history lagged, resyncing");
                    if let Err(e) = resync(&state, owner_id, &mut view).await {
                        tracing::error!(%conn_id, error = %e, "History resync failed");
                        break;
                    }
                    if send_snapshot(&mut sink, &view).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(%conn_id, "Pong received");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    tracing::info!(%conn_id, user_id = owner_id, "Live history disconnected");
}

/// Reload the owner's records into `view`.
async fn resync(state: &AppState, owner_id: DbId, view: &mut HistoryView) -> Result<(), CoreError> {
    let items = state
        .history
        .list(owner_id, &HistoryFilter::default())
        .await?;
    view.replace_all(items);
    Ok(())
}

async fn send_snapshot(sink: &mut WsSink, view: &HistoryView) -> Result<(), axum::Error> {
    let message = LiveFeedMessage::Snapshot {
        items: view.items().to_vec(),
    };
    let json = serde_json::to_string(&message).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}

fn ends_session(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::IdentityChanged {
            change: IdentityChange::SignedOut | IdentityChange::PasswordReset,
            ..
        }
    )
}
