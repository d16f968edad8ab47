//! Generation orchestrator.
//!
//! Lifecycle of one attempt:
//! 1. Reject a missing photo before anything starts.
//! 2. Claim the identity's attempt slot (single-flight).
//! 3. Extract themes and emotions; an incomplete analysis aborts.
//! 4. Generate the poem.
//! 5. Spawn persistence (blob upload, record insert, change event) as a
//!    detached task and return the poem without waiting for it.

use std::sync::Arc;
use std::time::Duration;

use photopoet_ai::{PhotoAnalysis, PoemGenerator, PoemRequest, ThemeExtractor};
use photopoet_core::attempt::AttemptState;
use photopoet_core::creation::{Creation, ImageRef, NewCreation};
use photopoet_core::data_uri::EncodedPhoto;
use photopoet_core::naming::creation_blob_path;
use photopoet_core::style::PoemStyle;
use photopoet_core::types::DbId;
use photopoet_db::CreationStore;
use photopoet_events::{AppEvent, EventBus};
use photopoet_storage::BlobStore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::attempts::AttemptRegistry;
use crate::error::{GenerationError, PersistError};

/// A photo as uploaded, with its original filename.
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub file_name: String,
    pub photo: EncodedPhoto,
}

/// One submit from the composer.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub owner_id: DbId,
    pub photo: Option<UploadedPhoto>,
    pub style: PoemStyle,
}

/// A successful attempt.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub poem: String,
    pub style: PoemStyle,
    pub analysis: PhotoAnalysis,
    pub photo_file_name: String,
    /// Detached persistence task. Resolves to the stored record, or `None`
    /// if saving failed (the failure is logged).
    pub persistence: JoinHandle<Option<Creation>>,
}

/// Drives extraction, generation and persistence.
pub struct Orchestrator {
    extractor: Arc<dyn ThemeExtractor>,
    generator: Arc<dyn PoemGenerator>,
    creations: Arc<dyn CreationStore>,
    blobs: Arc<dyn BlobStore>,
    events: Arc<EventBus>,
    attempts: AttemptRegistry,
    persistence: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn ThemeExtractor>,
        generator: Arc<dyn PoemGenerator>,
        creations: Arc<dyn CreationStore>,
        blobs: Arc<dyn BlobStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            extractor,
            generator,
            creations,
            blobs,
            events,
            attempts: AttemptRegistry::new(),
            persistence: TaskTracker::new(),
        }
    }

    /// Stop accepting new persistence tasks and wait up to `grace` for the
    /// running ones. Returns `false` if some were still running.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.persistence.close();
        let pending = self.persistence.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for creations to finish saving");
        }
        tokio::time::timeout(grace, self.persistence.wait())
            .await
            .is_ok()
    }

    /// Latest attempt state of an identity.
    pub fn current(&self, owner_id: DbId) -> AttemptState {
        self.attempts.current(owner_id)
    }

    /// Run one attempt to completion.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let GenerationRequest {
            owner_id,
            photo,
            style,
        } = request;
        let upload = photo.ok_or(GenerationError::MissingPhoto)?;

        let attempt = self.attempts.begin(owner_id, style)?;
        tracing::info!(user_id = owner_id, %style, "Generation started");

        let analysis = match self.extractor.extract(&upload.photo).await {
            Ok(analysis) => analysis,
            Err(e) => {
                let err = GenerationError::Analysis(e);
                tracing::warn!(user_id = owner_id, error = ?err, "Photo analysis failed");
                attempt.fail(&err.user_message())?;
                return Err(err);
            }
        };
        attempt.analyzed()?;

        let request = PoemRequest::from_analysis(&analysis, Some(style));
        let poem = match self.generator.generate(&request).await {
            Ok(generated) => generated.poem,
            Err(e) => {
                let err = GenerationError::Composition(e);
                tracing::warn!(user_id = owner_id, error = ?err, "Poem generation failed");
                attempt.fail(&err.user_message())?;
                return Err(err);
            }
        };
        attempt.composed(&poem)?;
        tracing::info!(user_id = owner_id, %style, "Generation finished");

        let photo_file_name = upload.file_name.clone();
        let persistence = self.spawn_persist(owner_id, upload, style, poem.clone());

        Ok(GenerationOutcome {
            poem,
            style,
            analysis,
            photo_file_name,
            persistence,
        })
    }

    fn spawn_persist(
        &self,
        owner_id: DbId,
        upload: UploadedPhoto,
        style: PoemStyle,
        poem: String,
    ) -> JoinHandle<Option<Creation>> {
        let creations = Arc::clone(&self.creations);
        let blobs = Arc::clone(&self.blobs);
        let events = Arc::clone(&self.events);
        self.persistence.spawn(async move {
            match persist(creations.as_ref(), blobs.as_ref(), owner_id, upload, style, poem).await {
                Ok(creation) => {
                    tracing::info!(user_id = owner_id, creation_id = creation.id, "Creation saved");
                    events.publish(AppEvent::creation_upserted(creation.clone()));
                    Some(creation)
                }
                Err(e) => {
                    tracing::error!(user_id = owner_id, error = %e, "Error saving history");
                    None
                }
            }
        })
    }
}

/// Upload the photo, then insert the record. A failed insert removes the
/// freshly uploaded blob.
async fn persist(
    creations: &dyn CreationStore,
    blobs: &dyn BlobStore,
    owner_id: DbId,
    upload: UploadedPhoto,
    style: PoemStyle,
    poem: String,
) -> Result<Creation, PersistError> {
    let path = creation_blob_path(owner_id, Uuid::now_v7(), &upload.file_name);
    let url = blobs
        .put(&path, &upload.photo.bytes, &upload.photo.mime_type)
        .await
        .map_err(PersistError::Upload)?;

    let input = NewCreation {
        owner_id,
        image: ImageRef::Blob {
            path: path.clone(),
            url,
        },
        photo_file_name: upload.file_name,
        style,
        poem,
    };
    match creations.create(input).await {
        Ok(creation) => Ok(creation),
        Err(e) => {
            if let Err(cleanup) = blobs.delete(&path).await {
                tracing::warn!(path = %path, error = %cleanup, "Orphaned photo blob");
            }
            Err(PersistError::Insert(e))
        }
    }
}
