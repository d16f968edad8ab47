//! Stub AI implementations shared by the unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use photopoet_ai::{AiError, GeneratedPoem, PhotoAnalysis, PoemGenerator, PoemRequest, ThemeExtractor};
use photopoet_core::data_uri::EncodedPhoto;

use crate::orchestrator::UploadedPhoto;

pub fn analysis(themes: &str, emotions: &str) -> PhotoAnalysis {
    PhotoAnalysis {
        themes: themes.into(),
        emotions: emotions.into(),
    }
}

pub fn upload() -> UploadedPhoto {
    UploadedPhoto {
        file_name: "lake.png".into(),
        photo: EncodedPhoto::new("image/png", vec![0x89, b'P', b'N', b'G']).unwrap(),
    }
}

pub struct StubExtractor {
    reply: PhotoAnalysis,
    delay: Duration,
}

impl StubExtractor {
    pub fn returning(reply: PhotoAnalysis) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ThemeExtractor for StubExtractor {
    async fn extract(&self, _photo: &EncodedPhoto) -> Result<PhotoAnalysis, AiError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone().validated()
    }
}

pub struct StubGenerator {
    failure: Mutex<Option<AiError>>,
    poem: String,
}

impl StubGenerator {
    pub fn returning(poem: &str) -> Self {
        Self {
            failure: Mutex::new(None),
            poem: poem.into(),
        }
    }

    /// Fail the next call with `err`.
    pub fn failing(err: AiError) -> Self {
        Self {
            failure: Mutex::new(Some(err)),
            poem: String::new(),
        }
    }
}

#[async_trait]
impl PoemGenerator for StubGenerator {
    async fn generate(&self, _request: &PoemRequest) -> Result<GeneratedPoem, AiError> {
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(GeneratedPoem {
            poem: self.poem.clone(),
        })
    }
}
