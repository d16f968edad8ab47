//! JWT-based authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use photopoet_core::error::CoreError;
use photopoet_core::types::DbId;

use crate::auth::jwt::{validate_token, ROLE_ANONYMOUS};
use crate::error::AppError;
use crate::state::AppState;

/// Query parameter accepted in place of the `Authorization` header, for
/// WebSocket upgrades from browsers that cannot set headers.
const TOKEN_QUERY_PARAM: &str = "access_token";

/// Authenticated identity extracted from a JWT Bearer token.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The identity's internal id (from `claims.sub`).
    pub user_id: DbId,
    /// Whether the identity was established without credentials.
    pub is_anonymous: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = validate_token(&token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            is_anonymous: claims.role == ROLE_ANONYMOUS,
        })
    }
}

/// Like [`AuthUser`], but a missing or invalid token yields `None` instead
/// of a 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// Token from `Authorization: Bearer <token>`, or the `access_token` query
/// parameter when no header is present.
fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(header) = parts.headers.get("authorization") {
        let value = header.to_str().map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Malformed Authorization header".into()))
        })?;
        return value
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Invalid Authorization format. Expected: Bearer <token>".into(),
                ))
            });
    }

    parts
        .uri
        .query()
        .and_then(|query| {
            query.split('&').find_map(|pair| {
                pair.strip_prefix(TOKEN_QUERY_PARAM)
                    .and_then(|rest| rest.strip_prefix('='))
            })
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_token_is_preferred() {
        let p = parts("/x?access_token=query", Some("Bearer header"));
        assert_eq!(bearer_token(&p).unwrap(), "header");
    }

    #[test]
    fn query_token_is_accepted_without_header() {
        let p = parts("/live?foo=1&access_token=abc.def", None);
        assert_eq!(bearer_token(&p).unwrap(), "abc.def");
    }

    #[test]
    fn non_bearer_header_is_rejected() {
        let p = parts("/x", Some("Basic Zm9v"));
        assert!(bearer_token(&p).is_err());
    }

    #[test]
    fn missing_token_is_rejected() {
        assert!(bearer_token(&parts("/x", None)).is_err());
    }
}
