//! Handlers for the `/creations` resource: the caller's history.
//!
//! Records owned by another identity answer 404, the same as missing ones.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use photopoet_core::creation::{Creation, DetailsUpdate};
use photopoet_core::history::HistoryFilter;
use photopoet_core::share::SharePayload;
use photopoet_core::style::PoemStyle;
use photopoet_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{attachment, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /creations`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Exact style label. Empty or `all` means every style.
    pub style: Option<String>,
    /// Case-insensitive search across title, note and poem.
    pub q: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> AppResult<HistoryFilter> {
        let style = match self.style.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) if label.eq_ignore_ascii_case("all") => None,
            Some(label) => Some(label.parse::<PoemStyle>()?),
        };
        Ok(HistoryFilter::new(style, self.q))
    }
}

/// Public link to a shared creation.
#[derive(Debug, Serialize)]
pub struct ShareLink {
    pub share_id: Uuid,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/creations?style=&q=
///
/// The caller's records, newest first, optionally filtered.
pub async fn list(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<Creation>>>> {
    let filter = query.into_filter()?;
    let items = state.history.list(auth_user.user_id, &filter).await?;
    Ok(Json(DataResponse { data: items }))
}

/// GET /api/v1/creations/{id}
pub async fn get(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Creation>>> {
    let creation = state.history.get(auth_user.user_id, id).await?;
    Ok(Json(DataResponse { data: creation }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// PATCH /api/v1/creations/{id}
///
/// Update title and/or note. Omitted fields stay unchanged; blank strings
/// clear them.
pub async fn update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<DetailsUpdate>,
) -> AppResult<Json<DataResponse<Creation>>> {
    let creation = state
        .history
        .update_details(auth_user.user_id, id, &input)
        .await?;
    Ok(Json(DataResponse { data: creation }))
}

/// DELETE /api/v1/creations/{id}
///
/// Removes the record, then its photo. Returns 204 No Content.
pub async fn delete(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.history.delete(auth_user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/creations/{id}/migrate-image
///
/// Move a legacy inline photo to the blob store.
pub async fn migrate_image(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Creation>>> {
    let creation = state.history.migrate_image(auth_user.user_id, id).await?;
    Ok(Json(DataResponse { data: creation }))
}

// ---------------------------------------------------------------------------
// Export / share
// ---------------------------------------------------------------------------

/// GET /api/v1/creations/{id}/poem.txt
pub async fn poem_text(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let download = state.history.poem_text(auth_user.user_id, id).await?;
    Ok(attachment(download))
}

/// GET /api/v1/creations/{id}/export.pdf
pub async fn export_pdf(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let download = state.history.export_pdf(auth_user.user_id, id).await?;
    tracing::info!(
        user_id = auth_user.user_id,
        creation_id = id,
        bytes = download.bytes.len(),
        "PDF exported"
    );
    Ok(attachment(download))
}

/// GET /api/v1/creations/{id}/share
///
/// Clipboard text and share-sheet title.
pub async fn share(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SharePayload>>> {
    let payload = state.history.share_payload(auth_user.user_id, id).await?;
    Ok(Json(DataResponse { data: payload }))
}

/// POST /api/v1/creations/{id}/share-link
///
/// Assign (or return the existing) public share id.
pub async fn share_link(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ShareLink>>> {
    let creation = state.history.share_link(auth_user.user_id, id).await?;
    let share_id = creation.share_id.ok_or_else(|| {
        AppError::InternalError(format!("Creation {id} has no share id after sharing"))
    })?;
    Ok(Json(DataResponse {
        data: ShareLink {
            share_id,
            url: format!("{}/api/v1/shared/{share_id}", state.config.public_base_url),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(style: Option<&str>, q: Option<&str>) -> ListQuery {
        ListQuery {
            style: style.map(str::to_string),
            q: q.map(str::to_string),
        }
    }

    #[test]
    fn blank_and_all_mean_every_style() {
        assert_eq!(query(Some(""), None).into_filter().unwrap().style, None);
        assert_eq!(query(Some("All"), None).into_filter().unwrap().style, None);
    }

    #[test]
    fn style_label_is_parsed() {
        let filter = query(Some("Free Verse"), Some("ocean")).into_filter().unwrap();
        assert_eq!(filter.style, Some(PoemStyle::FreeVerse));
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert!(query(Some("Prose"), None).into_filter().is_err());
    }
}
