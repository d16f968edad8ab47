//! The creation record: the only durable entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::style::PoemStyle;
use crate::types::{DbId, Timestamp};

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum note length in characters.
pub const MAX_NOTE_CHARS: usize = 2000;

/// Title shown when the owner has not set one.
pub const UNTITLED: &str = "Untitled Poem";

/// Where the photo of a creation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    /// Uploaded to the blob store. New records are always written this way.
    Blob { path: String, url: String },
    /// Legacy records that embedded the photo as a `data:` URI.
    Inline { data_uri: String },
}

impl ImageRef {
    /// Value suitable for an `<img src>`: the public URL or the data URI.
    pub fn src(&self) -> &str {
        match self {
            Self::Blob { url, .. } => url,
            Self::Inline { data_uri } => data_uri,
        }
    }

    /// Blob path to remove alongside the record, if any.
    pub fn blob_path(&self) -> Option<&str> {
        match self {
            Self::Blob { path, .. } => Some(path),
            Self::Inline { .. } => None,
        }
    }

    /// Rebuild from the three nullable storage columns.
    ///
    /// Returns `None` when the columns describe neither shape; such rows are
    /// quarantined by the stores instead of being handed to callers.
    pub fn from_columns(
        path: Option<String>,
        url: Option<String>,
        data_uri: Option<String>,
    ) -> Option<Self> {
        match (path, url, data_uri) {
            (Some(path), Some(url), None) if !path.is_empty() && !url.is_empty() => {
                Some(Self::Blob { path, url })
            }
            (None, None, Some(data_uri)) if data_uri.starts_with("data:") => {
                Some(Self::Inline { data_uri })
            }
            _ => None,
        }
    }

    /// Split into `(image_path, image_url, image_data_uri)` columns.
    pub fn into_columns(self) -> (Option<String>, Option<String>, Option<String>) {
        match self {
            Self::Blob { path, url } => (Some(path), Some(url), None),
            Self::Inline { data_uri } => (None, None, Some(data_uri)),
        }
    }
}

/// A persisted poem together with its photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creation {
    pub id: DbId,
    pub owner_id: DbId,
    pub image: ImageRef,
    pub photo_file_name: String,
    pub style: PoemStyle,
    pub poem: String,
    pub title: Option<String>,
    pub note: Option<String>,
    /// Public share identifier, assigned on first share-link request.
    pub share_id: Option<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Creation {
    /// Title for display, falling back to [`UNTITLED`].
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED)
    }
}

/// DTO for inserting a creation after a successful generation.
#[derive(Debug, Clone)]
pub struct NewCreation {
    pub owner_id: DbId,
    pub image: ImageRef,
    pub photo_file_name: String,
    pub style: PoemStyle,
    pub poem: String,
}

/// Partial update of the two mutable fields.
///
/// `None` leaves a field unchanged. `Some` replaces it; a blank string
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DetailsUpdate {
    /// Check length limits. Run before handing the update to a store.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(title) = &self.title {
            check_length("Title", title, MAX_TITLE_CHARS)?;
        }
        if let Some(note) = &self.note {
            check_length("Note", note, MAX_NOTE_CHARS)?;
        }
        Ok(())
    }

    /// True when neither field would be touched.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.note.is_none()
    }

    /// Apply to current values, returning the resulting `(title, note)`.
    pub fn resolve(
        &self,
        title: Option<String>,
        note: Option<String>,
    ) -> (Option<String>, Option<String>) {
        (
            resolve_field(self.title.as_deref(), title),
            resolve_field(self.note.as_deref(), note),
        )
    }

    /// The title to write: `None` to leave it, `Some(None)` to clear it.
    pub fn title_change(&self) -> Option<Option<&str>> {
        field_change(self.title.as_deref())
    }

    /// The note to write: `None` to leave it, `Some(None)` to clear it.
    pub fn note_change(&self) -> Option<Option<&str>> {
        field_change(self.note.as_deref())
    }
}

fn field_change(update: Option<&str>) -> Option<Option<&str>> {
    update.map(|value| {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    })
}

fn resolve_field(update: Option<&str>, current: Option<String>) -> Option<String> {
    match field_change(update) {
        None => current,
        Some(value) => value.map(str::to_string),
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {max} characters (got {len})"
        )));
    }
    Ok(())
}
