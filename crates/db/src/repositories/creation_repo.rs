//! Repository for the `creations` table.

use photopoet_core::creation::NewCreation;
use photopoet_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::creation::CreationRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, image_path, image_url, image_data_uri, photo_file_name, \
                        style, poem, title, note, share_id, created_at, updated_at";

/// Provides CRUD operations for creation records.
///
/// Rows come back unvalidated; callers convert them with
/// [`CreationRow::into_creation`].
pub struct CreationRepo;

impl CreationRepo {
    /// Insert a new record, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewCreation) -> Result<CreationRow, sqlx::Error> {
        let (image_path, image_url, image_data_uri) = input.image.clone().into_columns();
        let query = format!(
            "INSERT INTO creations
                (owner_id, image_path, image_url, image_data_uri, photo_file_name, style, poem)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(input.owner_id)
            .bind(image_path)
            .bind(image_url)
            .bind(image_data_uri)
            .bind(&input.photo_file_name)
            .bind(input.style.label())
            .bind(&input.poem)
            .fetch_one(pool)
            .await
    }

    /// Find a record by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM creations WHERE id = $1");
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's records, newest first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<CreationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM creations
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Change title and/or note in one statement. A `None` change leaves the
    /// column as stored; `Some(None)` clears it. Returns `None` if the row
    /// does not exist.
    pub async fn update_details(
        pool: &PgPool,
        id: DbId,
        title: Option<Option<&str>>,
        note: Option<Option<&str>>,
    ) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE creations SET
                title = CASE WHEN $2 THEN $3 ELSE title END,
                note = CASE WHEN $4 THEN $5 ELSE note END,
                updated_at = clock_timestamp()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(id)
            .bind(title.is_some())
            .bind(title.flatten())
            .bind(note.is_some())
            .bind(note.flatten())
            .fetch_optional(pool)
            .await
    }

    /// Delete a record, returning the removed row.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!("DELETE FROM creations WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set a share ID if none is assigned yet, returning the row either way.
    pub async fn assign_share_id(
        pool: &PgPool,
        id: DbId,
        share_id: Uuid,
    ) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE creations
             SET share_id = COALESCE(share_id, $2),
                 updated_at = CASE WHEN share_id IS NULL THEN clock_timestamp() ELSE updated_at END
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(id)
            .bind(share_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a record by its public share ID.
    pub async fn find_by_share_id(
        pool: &PgPool,
        share_id: Uuid,
    ) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM creations WHERE share_id = $1");
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(share_id)
            .fetch_optional(pool)
            .await
    }

    /// Point a legacy inline record at an uploaded blob.
    ///
    /// Only rows still holding a data URI are touched, so a concurrent
    /// migration of the same record is a no-op.
    pub async fn replace_inline_image(
        pool: &PgPool,
        id: DbId,
        image_path: &str,
        image_url: &str,
    ) -> Result<Option<CreationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE creations
             SET image_path = $2, image_url = $3, image_data_uri = NULL,
                 updated_at = clock_timestamp()
             WHERE id = $1 AND image_data_uri IS NOT NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreationRow>(&query)
            .bind(id)
            .bind(image_path)
            .bind(image_url)
            .fetch_optional(pool)
            .await
    }

    /// Cheap connectivity probe.
    pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
        Ok(())
    }
}
