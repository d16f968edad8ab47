//! Owner-scoped history operations.
//!
//! Every operation takes the calling identity and treats records owned by
//! someone else exactly like missing ones (`NotFound`), so record ids leak
//! nothing across identities.

use std::sync::Arc;

use photopoet_core::creation::{Creation, DetailsUpdate, ImageRef};
use photopoet_core::data_uri::EncodedPhoto;
use photopoet_core::error::CoreError;
use photopoet_core::history::HistoryFilter;
use photopoet_core::naming::{creation_blob_path, export_pdf_filename, poem_text_filename};
use photopoet_core::pdf::{render_pdf, PdfCreation};
use photopoet_core::share::SharePayload;
use photopoet_core::types::DbId;
use photopoet_db::CreationStore;
use photopoet_events::{AppEvent, EventBus};
use photopoet_storage::{BlobError, BlobStore};
use uuid::Uuid;

const ENTITY: &str = "Creation";

/// A rendered download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// History operations over the creation and blob stores.
pub struct HistoryAccessor {
    creations: Arc<dyn CreationStore>,
    blobs: Arc<dyn BlobStore>,
    events: Arc<EventBus>,
}

impl HistoryAccessor {
    pub fn new(
        creations: Arc<dyn CreationStore>,
        blobs: Arc<dyn BlobStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            creations,
            blobs,
            events,
        }
    }

    // ---- reads ----

    /// The owner's records, newest first, narrowed by `filter` after fetch.
    pub async fn list(
        &self,
        owner_id: DbId,
        filter: &HistoryFilter,
    ) -> Result<Vec<Creation>, CoreError> {
        let all = self.creations.list_by_owner(owner_id).await?;
        Ok(filter.apply(&all).into_iter().cloned().collect())
    }

    /// One record, if the caller owns it.
    pub async fn get(&self, owner_id: DbId, id: DbId) -> Result<Creation, CoreError> {
        match self.creations.find_by_id(id).await? {
            Some(creation) if creation.owner_id == owner_id => Ok(creation),
            _ => Err(CoreError::NotFound { entity: ENTITY, id }),
        }
    }

    /// Public read through a share link.
    pub async fn find_shared(&self, share_id: Uuid) -> Result<Option<Creation>, CoreError> {
        self.creations.find_by_share_id(share_id).await
    }

    // ---- writes ----

    /// Partial title/note update.
    pub async fn update_details(
        &self,
        owner_id: DbId,
        id: DbId,
        update: &DetailsUpdate,
    ) -> Result<Creation, CoreError> {
        update.validate()?;
        let current = self.get(owner_id, id).await?;
        if update.is_empty() {
            return Ok(current);
        }
        let updated = self
            .creations
            .update_details(id, update)
            .await?
            .ok_or(CoreError::NotFound { entity: ENTITY, id })?;
        tracing::info!(user_id = owner_id, creation_id = id, "Creation details updated");
        self.events
            .publish(AppEvent::creation_upserted(updated.clone()));
        Ok(updated)
    }

    /// Delete the record, then its blob.
    ///
    /// The two steps are independent: once the record is gone it stays gone
    /// even if removing the blob fails, and that failure is still reported.
    pub async fn delete(&self, owner_id: DbId, id: DbId) -> Result<(), CoreError> {
        self.get(owner_id, id).await?;
        let removed = self
            .creations
            .delete(id)
            .await?
            .ok_or(CoreError::NotFound { entity: ENTITY, id })?;
        self.events
            .publish(AppEvent::creation_removed(owner_id, id));
        tracing::info!(user_id = owner_id, creation_id = id, "Creation deleted");

        let Some(path) = removed.image.blob_path() else {
            return Ok(());
        };
        match self.blobs.delete(path).await {
            Ok(()) => Ok(()),
            Err(BlobError::NotFound(_)) => {
                tracing::warn!(creation_id = id, path, "Photo blob already missing");
                Ok(())
            }
            Err(e) => {
                tracing::error!(creation_id = id, path, error = %e, "Failed to delete photo blob");
                Err(CoreError::Internal(format!(
                    "Creation {id} was deleted but its photo could not be removed: {e}"
                )))
            }
        }
    }

    /// Assign (or return the existing) public share id.
    pub async fn share_link(&self, owner_id: DbId, id: DbId) -> Result<Creation, CoreError> {
        let current = self.get(owner_id, id).await?;
        if current.share_id.is_some() {
            return Ok(current);
        }
        let shared = self
            .creations
            .assign_share_id(id)
            .await?
            .ok_or(CoreError::NotFound { entity: ENTITY, id })?;
        self.events
            .publish(AppEvent::creation_upserted(shared.clone()));
        Ok(shared)
    }

    /// Move a legacy inline photo to the blob store.
    ///
    /// Records already pointing at a blob are returned unchanged.
    pub async fn migrate_image(&self, owner_id: DbId, id: DbId) -> Result<Creation, CoreError> {
        let current = self.get(owner_id, id).await?;
        let ImageRef::Inline { data_uri } = &current.image else {
            return Ok(current);
        };
        let photo = EncodedPhoto::from_data_uri(data_uri)?;
        let path = creation_blob_path(owner_id, Uuid::now_v7(), &current.photo_file_name);
        let url = self
            .blobs
            .put(&path, &photo.bytes, &photo.mime_type)
            .await
            .map_err(blob_error)?;

        let image = ImageRef::Blob {
            path: path.clone(),
            url,
        };
        match self.creations.replace_image(id, image).await? {
            Some(migrated) => {
                tracing::info!(creation_id = id, path = %path, "Inline photo migrated to blob store");
                self.events
                    .publish(AppEvent::creation_upserted(migrated.clone()));
                Ok(migrated)
            }
            None => {
                // Lost a race with another migration or a delete.
                if let Err(e) = self.blobs.delete(&path).await {
                    tracing::warn!(path = %path, error = %e, "Orphaned photo blob");
                }
                self.get(owner_id, id).await
            }
        }
    }

    // ---- export / share ----

    /// Photo bytes of a record, from the blob store or the inline payload.
    pub async fn image_bytes(&self, creation: &Creation) -> Result<Vec<u8>, CoreError> {
        match &creation.image {
            ImageRef::Blob { path, .. } => self.blobs.fetch(path).await.map_err(blob_error),
            ImageRef::Inline { data_uri } => Ok(EncodedPhoto::from_data_uri(data_uri)?.bytes),
        }
    }

    /// Render the PDF export.
    ///
    /// A photo that cannot be loaded or decoded is left out rather than
    /// failing the export.
    pub async fn export_pdf(&self, owner_id: DbId, id: DbId) -> Result<Download, CoreError> {
        let creation = self.get(owner_id, id).await?;
        let image = match self.image_bytes(&creation).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(creation_id = id, error = %e, "Exporting without photo");
                None
            }
        };
        let file_name = export_pdf_filename(creation.style, &creation.photo_file_name);

        let bytes = tokio::task::spawn_blocking(move || {
            let mut content = PdfCreation {
                title: creation.display_title(),
                style: creation.style,
                note: creation.note.as_deref(),
                poem: &creation.poem,
                created_at: creation.created_at,
                image: image.as_deref(),
            };
            match render_pdf(&content) {
                Err(CoreError::Validation(reason)) if content.image.is_some() => {
                    tracing::warn!(creation_id = creation.id, %reason, "Photo not decodable, exporting without it");
                    content.image = None;
                    render_pdf(&content)
                }
                other => other,
            }
        })
        .await
        .map_err(|e| CoreError::Internal(format!("PDF render task failed: {e}")))??;

        Ok(Download {
            file_name,
            content_type: "application/pdf",
            bytes,
        })
    }

    /// Plain-text poem download.
    pub async fn poem_text(&self, owner_id: DbId, id: DbId) -> Result<Download, CoreError> {
        let creation = self.get(owner_id, id).await?;
        Ok(Download {
            file_name: poem_text_filename(creation.style),
            content_type: "text/plain; charset=utf-8",
            bytes: creation.poem.into_bytes(),
        })
    }

    /// Clipboard/share-sheet payload.
    pub async fn share_payload(&self, owner_id: DbId, id: DbId) -> Result<SharePayload, CoreError> {
        let creation = self.get(owner_id, id).await?;
        Ok(SharePayload::new(creation.title.as_deref(), &creation.poem))
    }
}

fn blob_error(err: BlobError) -> CoreError {
    CoreError::Internal(format!("Blob store error: {err}"))
}
