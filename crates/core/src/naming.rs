//! Filename and blob-path conventions.

use uuid::Uuid;

use crate::style::PoemStyle;
use crate::types::DbId;

/// Longest sanitized filename kept in blob paths.
const MAX_BLOB_NAME_CHARS: usize = 100;

/// Fallback stem when a filename normalizes to nothing.
const FALLBACK_STEM: &str = "photo";

/// Filename for a PDF export.
///
/// Convention: `{style-slug}-{image-stem}.pdf`, where the stem is the photo
/// filename without extension, lowercased, with every run of
/// non-alphanumeric characters collapsed to a single `-`.
///
/// ```
/// use photopoet_core::naming::export_pdf_filename;
/// use photopoet_core::style::PoemStyle;
///
/// assert_eq!(
///     export_pdf_filename(PoemStyle::FreeVerse, "My Beach (1).JPG"),
///     "free-verse-my-beach-1.pdf"
/// );
/// ```
pub fn export_pdf_filename(style: PoemStyle, photo_file_name: &str) -> String {
    let stem = match photo_file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => photo_file_name,
    };
    let mut normalized = normalize_alphanumeric(stem);
    if normalized.is_empty() {
        normalized = FALLBACK_STEM.to_string();
    }
    format!("{}-{normalized}.pdf", style.slug())
}

/// Filename for the plain-text poem download: `{style-slug}-poem.txt`.
pub fn poem_text_filename(style: PoemStyle) -> String {
    format!("{}-poem.txt", style.slug())
}

/// Blob path for a newly uploaded creation photo.
///
/// Convention: `creations/{owner_id}/{uuid}-{sanitized_filename}`.
pub fn creation_blob_path(owner_id: DbId, upload_id: Uuid, photo_file_name: &str) -> String {
    format!(
        "creations/{owner_id}/{upload_id}-{}",
        sanitize_file_name(photo_file_name)
    )
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; replace everything else with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BLOB_NAME_CHARS)
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_alphanumeric(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}
