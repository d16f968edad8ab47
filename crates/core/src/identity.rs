//! Session principals that own creation records.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// An authenticated or anonymous principal.
///
/// Anonymous identities own their records exactly like registered ones;
/// they simply have no email or password attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: DbId,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl Identity {
    pub fn anonymous(id: DbId) -> Self {
        Self {
            id,
            email: None,
            is_anonymous: true,
        }
    }

    pub fn registered(id: DbId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            is_anonymous: false,
        }
    }
}
