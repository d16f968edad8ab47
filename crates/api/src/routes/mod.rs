pub mod auth;
pub mod creations;
pub mod generation;
pub mod health;
pub mod shared;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/session                          resume or establish (public)
/// /auth/anonymous                        anonymous sign-in (public)
/// /auth/signup                           register (public)
/// /auth/login                            login (public)
/// /auth/refresh                          rotate tokens (public)
/// /auth/logout                           sign out (requires auth)
/// /auth/password-reset                   request reset mail (public)
/// /auth/password-reset/confirm           set new password (public)
/// /auth/me                               current identity
///
/// /generations                           generate a poem (POST, multipart)
/// /generations/current                   latest attempt state
///
/// /creations                             list (?style=&q=)
/// /creations/live                        live history (WebSocket)
/// /creations/{id}                        get, patch, delete
/// /creations/{id}/poem.txt               poem download
/// /creations/{id}/export.pdf             PDF export
/// /creations/{id}/share                  share text
/// /creations/{id}/share-link             public link (POST)
/// /creations/{id}/migrate-image          inline photo to blob (POST)
///
/// /shared/{share_id}                     public read-only view
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/generations", generation::router())
        .nest("/creations", creations::router())
        .nest("/shared", shared::router())
}
