//! Route definitions for the public `/shared` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::shared;
use crate::state::AppState;

/// Routes mounted at `/shared`. No auth.
///
/// ```text
/// GET /{share_id}  -> get
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{share_id}", get(shared::get))
}
