//! Repository for the `password_reset_tokens` table.

use photopoet_core::types::DbId;
use sqlx::PgPool;

use crate::models::password_reset::CreatePasswordReset;

/// Issues and redeems single-use password reset tokens.
pub struct PasswordResetRepo;

impl PasswordResetRepo {
    /// Store the hash of a freshly issued token.
    pub async fn create(pool: &PgPool, input: &CreatePasswordReset) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(input.user_id)
        .bind(&input.token_hash)
        .bind(input.expires_at)
        .fetch_one(pool)
        .await
    }

    /// Mark an unused, unexpired token as used and return its user id.
    ///
    /// The `UPDATE ... WHERE used_at IS NULL` makes redemption single-use even
    /// under concurrent requests.
    pub async fn consume(pool: &PgPool, token_hash: &str) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE password_reset_tokens SET used_at = NOW()
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }
}
