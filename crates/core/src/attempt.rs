//! Per-attempt state machine for photo-to-poem generation.
//!
//! ```text
//! Idle ──begin──▶ Analyzing ──analyzed──▶ Composing ──composed──▶ Done
//!                     │                       │
//!                     └────────failed─────────┴──▶ Idle { last_error }
//! ```
//!
//! `Done` behaves like `Idle` for the purpose of starting a new attempt.
//! Starting clears the previous poem so a failed retry never shows it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::style::PoemStyle;

/// Message shown when extraction yields an incomplete analysis.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Could not analyze photo themes and emotions.";

/// Message shown when a submit arrives without a photo.
pub const MISSING_PHOTO_MESSAGE: &str = "Please upload a photo first.";

/// Fallback message for failures that carry no user-facing text.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unknown error occurred during poem generation.";

/// Where a generation attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptState {
    Idle {
        #[serde(skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
    Analyzing {
        style: PoemStyle,
    },
    Composing {
        style: PoemStyle,
    },
    Done {
        style: PoemStyle,
        poem: String,
    },
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::Idle { last_error: None }
    }
}

impl AttemptState {
    /// Whether an attempt is running (the submit control is disabled).
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Analyzing { .. } | Self::Composing { .. })
    }

    /// Start a new attempt. Rejected with `Conflict` while one is in flight.
    pub fn begin(&self, style: PoemStyle) -> Result<Self, CoreError> {
        if self.is_in_flight() {
            return Err(CoreError::Conflict(
                "A poem is already being generated".into(),
            ));
        }
        Ok(Self::Analyzing { style })
    }

    /// Extraction finished; move on to composing.
    pub fn analyzed(&self) -> Result<Self, CoreError> {
        match self {
            Self::Analyzing { style } => Ok(Self::Composing { style: *style }),
            other => Err(illegal("analyzed", other)),
        }
    }

    /// Generation finished with `poem`.
    pub fn composed(&self, poem: impl Into<String>) -> Result<Self, CoreError> {
        match self {
            Self::Composing { style } => Ok(Self::Done {
                style: *style,
                poem: poem.into(),
            }),
            other => Err(illegal("composed", other)),
        }
    }

    /// Abort the in-flight attempt and surface `message`.
    pub fn failed(&self, message: impl Into<String>) -> Result<Self, CoreError> {
        if !self.is_in_flight() {
            return Err(illegal("failed", self));
        }
        Ok(Self::Idle {
            last_error: Some(message.into()),
        })
    }

    /// Poem to display, only in `Done`.
    pub fn poem(&self) -> Option<&str> {
        match self {
            Self::Done { poem, .. } => Some(poem),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Analyzing { .. } => "analyzing",
            Self::Composing { .. } => "composing",
            Self::Done { .. } => "done",
        }
    }
}

fn illegal(event: &str, state: &AttemptState) -> CoreError {
    CoreError::Internal(format!(
        "Illegal attempt transition '{event}' from state '{}'",
        state.name()
    ))
}
