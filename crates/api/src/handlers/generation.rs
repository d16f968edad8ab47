//! Handlers for the `/generations` resource.
//!
//! A generation is one photo-to-poem attempt. The response carries the poem
//! as soon as it is composed; saving it to history happens in the background.

use axum::extract::{Multipart, State};
use axum::Json;
use photopoet_ai::PhotoAnalysis;
use photopoet_core::attempt::AttemptState;
use photopoet_core::data_uri::EncodedPhoto;
use photopoet_core::style::PoemStyle;
use photopoet_pipeline::{GenerationRequest, UploadedPhoto};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Multipart field carrying the photo file.
const PHOTO_FIELD: &str = "photo";

/// Multipart field carrying the style label.
const STYLE_FIELD: &str = "style";

/// Filename used when the upload does not name one.
const UNNAMED_PHOTO: &str = "photo";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A composed poem together with the analysis it was written from.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub poem: String,
    pub style: PoemStyle,
    pub themes: String,
    pub emotions: String,
    pub photo_file_name: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Multipart form with a `photo` file and an optional `style` label
/// (default: the first style, Haiku).
pub async fn create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<GenerationResponse>> {
    let (photo, style) = read_form(multipart, state.config.max_upload_bytes).await?;

    let outcome = state
        .orchestrator
        .generate(GenerationRequest {
            owner_id: auth_user.user_id,
            photo,
            style,
        })
        .await?;

    // The persistence task keeps running after the handle is dropped.
    let PhotoAnalysis { themes, emotions } = outcome.analysis;
    Ok(Json(GenerationResponse {
        poem: outcome.poem,
        style: outcome.style,
        themes,
        emotions,
        photo_file_name: outcome.photo_file_name,
    }))
}

/// GET /api/v1/generations/current
///
/// The caller's latest attempt state.
pub async fn current(State(state): State<AppState>, auth_user: AuthUser) -> Json<AttemptState> {
    Json(state.orchestrator.current(auth_user.user_id))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pull the photo and style out of the form. An absent or empty file field
/// yields `None` so the orchestrator reports the missing photo.
async fn read_form(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> AppResult<(Option<UploadedPhoto>, PoemStyle)> {
    let mut photo = None;
    let mut style = PoemStyle::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PHOTO_FIELD) => {
                let file_name = field
                    .file_name()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNNAMED_PHOTO)
                    .to_string();
                let declared_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > max_upload_bytes {
                    return Err(AppError::BadRequest(format!(
                        "Photo exceeds the {max_upload_bytes} byte upload limit"
                    )));
                }
                let mime_type = declared_type
                    .filter(|t| t.starts_with("image/"))
                    .or_else(|| mime_from_extension(&file_name).map(str::to_string))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                photo = Some(UploadedPhoto {
                    photo: EncodedPhoto::new(mime_type, bytes.to_vec())?,
                    file_name,
                });
            }
            Some(STYLE_FIELD) => {
                let label = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let label = label.trim();
                if !label.is_empty() {
                    style = label.parse()?;
                }
            }
            _ => {}
        }
    }

    Ok((photo, style))
}

/// Image MIME type implied by a filename extension.
fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}
