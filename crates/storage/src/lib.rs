//! Blob store boundary for creation photos.
//!
//! Paths are relative, `/`-separated keys such as
//! `creations/42/0190...-beach.png`. [`BlobStore::public_url`] maps a key to
//! the URL clients load the image from.

use async_trait::async_trait;

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Errors raised by blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage for uploaded photos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path`, returning its public URL.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<String, BlobError>;

    /// Read the bytes stored at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    /// Remove `path`. Missing blobs are reported as [`BlobError::NotFound`].
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    /// Public URL for `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Reject keys that could escape the store root.
pub fn validate_path(path: &str) -> Result<(), BlobError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Join a base URL and a key with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn accepts_nested_relative_keys() {
        assert!(validate_path("creations/1/abc-photo.png").is_ok());
    }

    #[test]
    fn rejects_traversal_and_absolute_keys() {
        for path in ["", "/etc/passwd", "creations/../x", "a//b", "./a", "a\\b"] {
            assert_matches!(validate_path(path), Err(BlobError::InvalidPath(_)), "{path}");
        }
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://h/blobs/", "a/b.png"), "http://h/blobs/a/b.png");
        assert_eq!(join_url("http://h/blobs", "a/b.png"), "http://h/blobs/a/b.png");
    }
}
