//! Creation row model and its conversion to the domain type.

use photopoet_core::creation::{Creation, ImageRef};
use photopoet_core::style::PoemStyle;
use photopoet_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A raw row from the `creations` table.
///
/// Columns are stored loosely typed; [`CreationRow::into_creation`] is the
/// single place where a row is checked against the record shape.
#[derive(Debug, Clone, FromRow)]
pub struct CreationRow {
    pub id: DbId,
    pub owner_id: DbId,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub image_data_uri: Option<String>,
    pub photo_file_name: String,
    pub style: String,
    pub poem: String,
    pub title: Option<String>,
    pub note: Option<String>,
    pub share_id: Option<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Why a stored row was withheld from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quarantine {
    UnknownStyle(String),
    MalformedImage,
}

impl std::fmt::Display for Quarantine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStyle(style) => write!(f, "unknown style '{style}'"),
            Self::MalformedImage => f.write_str("image columns match neither blob nor inline shape"),
        }
    }
}

impl CreationRow {
    /// Validate the row and convert it to a [`Creation`].
    pub fn into_creation(self) -> Result<Creation, Quarantine> {
        let style = PoemStyle::from_label(&self.style)
            .ok_or_else(|| Quarantine::UnknownStyle(self.style.clone()))?;
        let image = ImageRef::from_columns(self.image_path, self.image_url, self.image_data_uri)
            .ok_or(Quarantine::MalformedImage)?;
        Ok(Creation {
            id: self.id,
            owner_id: self.owner_id,
            image,
            photo_file_name: self.photo_file_name,
            style,
            poem: self.poem,
            title: self.title,
            note: self.note,
            share_id: self.share_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
