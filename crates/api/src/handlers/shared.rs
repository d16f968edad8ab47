//! Public, read-only access to creations through share links.

use axum::extract::{Path, State};
use axum::Json;
use photopoet_core::creation::Creation;
use photopoet_core::style::PoemStyle;
use photopoet_core::types::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// What a share link reveals. Owner, note and storage details stay private.
#[derive(Debug, Serialize)]
pub struct SharedCreation {
    pub title: String,
    pub style: PoemStyle,
    pub poem: String,
    pub image_url: String,
    pub created_at: Timestamp,
}

impl From<Creation> for SharedCreation {
    fn from(creation: Creation) -> Self {
        Self {
            title: creation.display_title().to_string(),
            image_url: creation.image.src().to_string(),
            style: creation.style,
            poem: creation.poem,
            created_at: creation.created_at,
        }
    }
}

/// GET /api/v1/shared/{share_id}
///
/// No authentication required.
pub async fn get(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SharedCreation>>> {
    let creation = state
        .history
        .find_shared(share_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shared creation {share_id} not found")))?;
    Ok(Json(DataResponse {
        data: creation.into(),
    }))
}
