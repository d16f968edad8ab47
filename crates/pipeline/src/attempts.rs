//! Per-identity attempt tracking.
//!
//! At most one attempt is in flight per identity. [`AttemptRegistry::begin`]
//! hands out an [`AttemptGuard`] that drives the state machine; a guard
//! dropped mid-flight (e.g. the request was abandoned) fails the attempt so
//! the identity is never left locked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use photopoet_core::attempt::{AttemptState, GENERIC_FAILURE_MESSAGE};
use photopoet_core::error::CoreError;
use photopoet_core::style::PoemStyle;
use photopoet_core::types::DbId;

/// Current attempt state of every identity that has generated something.
#[derive(Debug, Clone, Default)]
pub struct AttemptRegistry {
    states: Arc<Mutex<HashMap<DbId, AttemptState>>>,
}

impl AttemptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DbId, AttemptState>> {
        // A poisoned map only means a panic mid-update; the states are still usable.
        self.states.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The identity's latest state, `Idle` if it never generated.
    pub fn current(&self, owner_id: DbId) -> AttemptState {
        self.lock().get(&owner_id).cloned().unwrap_or_default()
    }

    /// Start an attempt. Fails with `Conflict` while another is in flight.
    pub fn begin(&self, owner_id: DbId, style: PoemStyle) -> Result<AttemptGuard, CoreError> {
        let mut states = self.lock();
        let current = states.get(&owner_id).cloned().unwrap_or_default();
        let next = current.begin(style)?;
        states.insert(owner_id, next);
        Ok(AttemptGuard {
            registry: self.clone(),
            owner_id,
            finished: false,
        })
    }

    fn transition(
        &self,
        owner_id: DbId,
        step: impl FnOnce(&AttemptState) -> Result<AttemptState, CoreError>,
    ) -> Result<AttemptState, CoreError> {
        let mut states = self.lock();
        let current = states.get(&owner_id).cloned().unwrap_or_default();
        let next = step(&current)?;
        states.insert(owner_id, next.clone());
        Ok(next)
    }
}

/// Exclusive handle on one identity's in-flight attempt.
#[derive(Debug)]
pub struct AttemptGuard {
    registry: AttemptRegistry,
    owner_id: DbId,
    finished: bool,
}

impl AttemptGuard {
    pub fn owner_id(&self) -> DbId {
        self.owner_id
    }

    /// Extraction finished.
    pub fn analyzed(&self) -> Result<AttemptState, CoreError> {
        self.registry.transition(self.owner_id, AttemptState::analyzed)
    }

    /// Generation finished; the attempt is done.
    pub fn composed(mut self, poem: &str) -> Result<AttemptState, CoreError> {
        self.finished = true;
        self.registry
            .transition(self.owner_id, |s| s.composed(poem))
    }

    /// Abort with a user-facing message.
    pub fn fail(mut self, message: &str) -> Result<AttemptState, CoreError> {
        self.finished = true;
        self.registry.transition(self.owner_id, |s| s.failed(message))
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let result = self
            .registry
            .transition(self.owner_id, |s| s.failed(GENERIC_FAILURE_MESSAGE));
        if let Err(e) = result {
            tracing::warn!(user_id = self.owner_id, error = %e, "Could not release abandoned attempt");
        }
    }
}
