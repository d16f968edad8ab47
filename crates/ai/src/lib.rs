//! AI boundary: theme/emotion extraction and poem generation.
//!
//! Both calls are single request/response exchanges with a hosted model.
//! Outputs are validated against a fixed shape; a malformed or incomplete
//! response is an error, never a partial success.

use async_trait::async_trait;
use photopoet_core::data_uri::EncodedPhoto;

pub mod analysis;
pub mod client;
pub mod error;
pub mod prompts;

pub use analysis::{GeneratedPoem, PhotoAnalysis, PoemRequest};
pub use client::{ModelClient, ModelConfig};
pub use error::AiError;

/// Extracts themes and emotions from a photo.
#[async_trait]
pub trait ThemeExtractor: Send + Sync {
    /// Returns an analysis with both fields non-empty, or an error.
    async fn extract(&self, photo: &EncodedPhoto) -> Result<PhotoAnalysis, AiError>;
}

/// Turns themes and emotions into verse.
#[async_trait]
pub trait PoemGenerator: Send + Sync {
    async fn generate(&self, request: &PoemRequest) -> Result<GeneratedPoem, AiError>;
}
