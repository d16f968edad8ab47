//! Route definitions for the `/generations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generations`. All require auth.
///
/// ```text
/// POST /         -> create (multipart: photo, style)
/// GET  /current  -> current
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::create))
        .route("/current", get(generation::current))
}
