//! Store boundaries used by the pipeline and the API.
//!
//! Two implementations exist: [`crate::pg::PgStore`] backed by Postgres and
//! [`crate::memory::MemoryStore`] for local development and tests. Both
//! report failures as [`CoreError`].

use async_trait::async_trait;
use photopoet_core::creation::{Creation, DetailsUpdate, ImageRef, NewCreation};
use photopoet_core::error::CoreError;
use photopoet_core::types::{DbId, Timestamp};
use uuid::Uuid;

use crate::models::password_reset::CreatePasswordReset;
use crate::models::session::{CreateSession, UserSession};
use crate::models::user::User;

/// Persistence for creation records.
///
/// Ownership is not enforced here; callers compare `owner_id` themselves.
#[async_trait]
pub trait CreationStore: Send + Sync {
    /// Insert a new record with server-assigned id and timestamps.
    async fn create(&self, input: NewCreation) -> Result<Creation, CoreError>;

    /// Point read. Quarantined rows read as `None`.
    async fn find_by_id(&self, id: DbId) -> Result<Option<Creation>, CoreError>;

    /// All well-formed records of an owner, newest first.
    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Creation>, CoreError>;

    /// Apply a validated details update, bumping `updated_at`.
    async fn update_details(
        &self,
        id: DbId,
        update: &DetailsUpdate,
    ) -> Result<Option<Creation>, CoreError>;

    /// Remove a record, returning what was removed.
    async fn delete(&self, id: DbId) -> Result<Option<Creation>, CoreError>;

    /// Assign a public share id unless one exists already.
    async fn assign_share_id(&self, id: DbId) -> Result<Option<Creation>, CoreError>;

    async fn find_by_share_id(&self, share_id: Uuid) -> Result<Option<Creation>, CoreError>;

    /// Swap an inline image for a blob reference. Returns `None` when the
    /// record is missing or no longer inline.
    async fn replace_image(&self, id: DbId, image: ImageRef)
        -> Result<Option<Creation>, CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

/// Persistence for identities, sessions and password reset tokens.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_anonymous(&self) -> Result<User, CoreError>;

    /// Register an email account. Duplicate emails fail with `Conflict`.
    async fn create_registered(&self, email: &str, password_hash: &str)
        -> Result<User, CoreError>;

    async fn find_user(&self, id: DbId) -> Result<Option<User>, CoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    async fn record_failed_login(
        &self,
        id: DbId,
        lock_until: Option<Timestamp>,
    ) -> Result<(), CoreError>;

    async fn record_successful_login(&self, id: DbId) -> Result<(), CoreError>;

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, CoreError>;

    async fn create_session(&self, input: CreateSession) -> Result<UserSession, CoreError>;

    /// Non-revoked, unexpired session with this refresh token hash.
    async fn find_active_session(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<UserSession>, CoreError>;

    async fn revoke_session(&self, id: DbId) -> Result<bool, CoreError>;

    async fn revoke_all_sessions(&self, user_id: DbId) -> Result<u64, CoreError>;

    async fn create_reset_token(&self, input: CreatePasswordReset) -> Result<(), CoreError>;

    /// Redeem a reset token once, returning the user it belongs to.
    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<DbId>, CoreError>;
}
