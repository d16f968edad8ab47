//! Encoded photo payloads and the `data:<mime>;base64,<payload>` form.
//!
//! The model boundary takes photos as MIME-tagged base64, and legacy
//! creation records carry the same form inline.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CoreError;

/// A photo held in memory together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPhoto {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedPhoto {
    /// Build a photo from raw upload bytes.
    ///
    /// Rejects empty payloads and MIME types outside `image/*`.
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CoreError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(CoreError::Validation(format!(
                "Unsupported photo type '{mime_type}'. Expected an image/* type"
            )));
        }
        if bytes.is_empty() {
            return Err(CoreError::Validation("Photo is empty".into()));
        }
        Ok(Self { mime_type, bytes })
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, CoreError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::Validation("Data URI must start with 'data:'".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CoreError::Validation("Data URI is missing its payload".into()))?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            CoreError::Validation("Data URI must use base64 encoding".into())
        })?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CoreError::Validation(format!("Invalid base64 payload: {e}")))?;
        Self::new(mime_type, bytes)
    }

    /// Base64 (standard alphabet, padded) encoding of the bytes.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Render as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}
