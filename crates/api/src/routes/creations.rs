//! Route definitions for the `/creations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::creations;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/creations`. All require auth.
///
/// ```text
/// GET    /                     -> list
/// GET    /live                 -> live_history (WebSocket)
/// GET    /{id}                 -> get
/// PATCH  /{id}                 -> update
/// DELETE /{id}                 -> delete
/// GET    /{id}/poem.txt        -> poem_text
/// GET    /{id}/export.pdf      -> export_pdf
/// GET    /{id}/share           -> share
/// POST   /{id}/share-link      -> share_link
/// POST   /{id}/migrate-image   -> migrate_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(creations::list))
        .route("/live", get(ws::live_history))
        .route(
            "/{id}",
            get(creations::get)
                .patch(creations::update)
                .delete(creations::delete),
        )
        .route("/{id}/poem.txt", get(creations::poem_text))
        .route("/{id}/export.pdf", get(creations::export_pdf))
        .route("/{id}/share", get(creations::share))
        .route("/{id}/share-link", post(creations::share_link))
        .route("/{id}/migrate-image", post(creations::migrate_image))
}
