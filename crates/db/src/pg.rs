//! Postgres-backed store adapters.

use async_trait::async_trait;
use photopoet_core::creation::{Creation, DetailsUpdate, ImageRef, NewCreation};
use photopoet_core::error::CoreError;
use photopoet_core::types::{DbId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::creation::CreationRow;
use crate::models::password_reset::CreatePasswordReset;
use crate::models::session::{CreateSession, UserSession};
use crate::models::user::{CreateUser, User};
use crate::repositories::{CreationRepo, PasswordResetRepo, SessionRepo, UserRepo};
use crate::store::{CreationStore, IdentityStore};

/// Both store traits over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a sqlx error onto the domain error.
///
/// Unique violations on `uq_` constraints become `Conflict`; everything else
/// is logged and reported as `Internal`.
pub fn classify_sqlx_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("Database error".into())
}

/// Convert a row, logging and dropping it when it fails validation.
fn admit(row: CreationRow) -> Option<Creation> {
    let id = row.id;
    match row.into_creation() {
        Ok(creation) => Some(creation),
        Err(reason) => {
            tracing::warn!(creation_id = id, %reason, "Quarantined malformed creation row");
            None
        }
    }
}

#[async_trait]
impl CreationStore for PgStore {
    async fn create(&self, input: NewCreation) -> Result<Creation, CoreError> {
        let row = CreationRepo::create(&self.pool, &input)
            .await
            .map_err(classify_sqlx_error)?;
        let id = row.id;
        admit(row).ok_or_else(|| {
            CoreError::Internal(format!("Inserted creation {id} failed validation"))
        })
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        let row = CreationRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Creation>, CoreError> {
        let rows = CreationRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(rows.into_iter().filter_map(admit).collect())
    }

    async fn update_details(
        &self,
        id: DbId,
        update: &DetailsUpdate,
    ) -> Result<Option<Creation>, CoreError> {
        update.validate()?;
        let row = CreationRepo::update_details(
            &self.pool,
            id,
            update.title_change(),
            update.note_change(),
        )
        .await
        .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn delete(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        let row = CreationRepo::delete(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn assign_share_id(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        let row = CreationRepo::assign_share_id(&self.pool, id, Uuid::new_v4())
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn find_by_share_id(&self, share_id: Uuid) -> Result<Option<Creation>, CoreError> {
        let row = CreationRepo::find_by_share_id(&self.pool, share_id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn replace_image(
        &self,
        id: DbId,
        image: ImageRef,
    ) -> Result<Option<Creation>, CoreError> {
        let ImageRef::Blob { path, url } = image else {
            return Err(CoreError::Validation(
                "Replacement image must be a blob reference".into(),
            ));
        };
        let row = CreationRepo::replace_inline_image(&self.pool, id, &path, &url)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.and_then(admit))
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        CreationRepo::ping(&self.pool)
            .await
            .map_err(classify_sqlx_error)
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_anonymous(&self) -> Result<User, CoreError> {
        UserRepo::create_anonymous(&self.pool)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn create_registered(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<User, CoreError> {
        let input = CreateUser {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        UserRepo::create(&self.pool, &input)
            .await
            .map_err(classify_sqlx_error)
            .map_err(|e| match e {
                CoreError::Conflict(_) => {
                    CoreError::Conflict("An account with this email already exists".into())
                }
                other => other,
            })
    }

    async fn find_user(&self, id: DbId) -> Result<Option<User>, CoreError> {
        UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn record_failed_login(
        &self,
        id: DbId,
        lock_until: Option<Timestamp>,
    ) -> Result<(), CoreError> {
        UserRepo::record_failed_login(&self.pool, id, lock_until)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn record_successful_login(&self, id: DbId) -> Result<(), CoreError> {
        UserRepo::record_successful_login(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, CoreError> {
        UserRepo::update_password(&self.pool, id, password_hash)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn create_session(&self, input: CreateSession) -> Result<UserSession, CoreError> {
        SessionRepo::create(&self.pool, &input)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn find_active_session(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<UserSession>, CoreError> {
        SessionRepo::find_by_refresh_token_hash(&self.pool, refresh_token_hash)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn revoke_session(&self, id: DbId) -> Result<bool, CoreError> {
        SessionRepo::revoke(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn revoke_all_sessions(&self, user_id: DbId) -> Result<u64, CoreError> {
        SessionRepo::revoke_all_for_user(&self.pool, user_id)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn create_reset_token(&self, input: CreatePasswordReset) -> Result<(), CoreError> {
        PasswordResetRepo::create(&self.pool, &input)
            .await
            .map(|_| ())
            .map_err(classify_sqlx_error)
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<DbId>, CoreError> {
        PasswordResetRepo::consume(&self.pool, token_hash)
            .await
            .map_err(classify_sqlx_error)
    }
}
