use photopoet_ai::AiError;
use photopoet_core::attempt::{
    ANALYSIS_FAILED_MESSAGE, GENERIC_FAILURE_MESSAGE, MISSING_PHOTO_MESSAGE,
};
use photopoet_core::error::CoreError;
use photopoet_storage::BlobError;

/// Why a generation attempt did not produce a poem.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Submitted without a photo. The attempt never started.
    #[error("{}", MISSING_PHOTO_MESSAGE)]
    MissingPhoto,

    /// Rejected before starting (another attempt in flight, bad input).
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// Extraction failed or returned an incomplete analysis.
    #[error("{}", ANALYSIS_FAILED_MESSAGE)]
    Analysis(#[source] AiError),

    /// Poem generation failed.
    #[error("{}", GENERIC_FAILURE_MESSAGE)]
    Composition(#[source] AiError),
}

/// Why a composed poem could not be saved to the history.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Photo upload failed: {0}")]
    Upload(#[source] BlobError),

    #[error("Record insert failed: {0}")]
    Insert(#[source] CoreError),
}

impl GenerationError {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
