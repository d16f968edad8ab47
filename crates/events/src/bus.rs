//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application. The
//! live history feed and the client identity stream are built on it.

use chrono::{DateTime, Utc};
use photopoet_core::creation::Creation;
use photopoet_core::history::HistoryChange;
use photopoet_core::types::DbId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// AppEvent
// ---------------------------------------------------------------------------

/// What happened to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityChange {
    SignedIn,
    SignedUp,
    Anonymous,
    SignedOut,
    PasswordReset,
}

/// A domain event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A record was created or had its details edited.
    CreationUpserted { creation: Creation },
    /// A record was deleted.
    CreationRemoved {
        owner_id: DbId,
        creation_id: DbId,
        at: DateTime<Utc>,
    },
    /// An identity signed in, out, or changed credentials.
    IdentityChanged {
        user_id: DbId,
        change: IdentityChange,
        at: DateTime<Utc>,
    },
}

impl AppEvent {
    pub fn creation_upserted(creation: Creation) -> Self {
        Self::CreationUpserted { creation }
    }

    pub fn creation_removed(owner_id: DbId, creation_id: DbId) -> Self {
        Self::CreationRemoved {
            owner_id,
            creation_id,
            at: Utc::now(),
        }
    }

    pub fn identity_changed(user_id: DbId, change: IdentityChange) -> Self {
        Self::IdentityChanged {
            user_id,
            change,
            at: Utc::now(),
        }
    }

    /// The identity whose history or session this event concerns.
    pub fn owner_id(&self) -> DbId {
        match self {
            Self::CreationUpserted { creation } => creation.owner_id,
            Self::CreationRemoved { owner_id, .. } => *owner_id,
            Self::IdentityChanged { user_id, .. } => *user_id,
        }
    }

    /// The history change carried by this event, if any.
    pub fn history_change(&self) -> Option<HistoryChange> {
        match self {
            Self::CreationUpserted { creation } => Some(HistoryChange::Upsert {
                creation: creation.clone(),
            }),
            Self::CreationRemoved {
                creation_id, at, ..
            } => Some(HistoryChange::Remove {
                id: *creation_id,
                at: *at,
            }),
            Self::IdentityChanged { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use photopoet_events::bus::{AppEvent, EventBus, IdentityChange};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(AppEvent::identity_changed(1, IdentityChange::Anonymous));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: AppEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
