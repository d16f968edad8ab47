//! Shared response types for API handlers.
//!
//! Resource endpoints use a `{ "data": ... }` envelope via [`DataResponse`].
//! File downloads go through [`attachment`].

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use photopoet_pipeline::Download;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Serve a rendered file as an attachment.
pub fn attachment(download: Download) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace('"', "")
    );
    (
        [
            (CONTENT_TYPE, download.content_type.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response()
}
