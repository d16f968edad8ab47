//! Handlers for the `/auth` resource: sessions, anonymous and email
//! identities, password reset.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use photopoet_core::error::CoreError;
use photopoet_core::identity::Identity;
use photopoet_core::types::DbId;
use photopoet_db::models::password_reset::CreatePasswordReset;
use photopoet_db::models::session::CreateSession;
use photopoet_db::models::user::User;
use photopoet_events::{AppEvent, IdentityChange, OutgoingEmail};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{generate_access_token, generate_opaque_token, hash_token, role_for};
use crate::auth::password::{
    hash_password, validate_password_strength, verify_password, MIN_PASSWORD_LENGTH,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

/// Lifetime of a password reset token.
const RESET_TOKEN_EXPIRY_MINS: i64 = 60;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup` and `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for `POST /auth/password-reset`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Request body for `POST /auth/password-reset/confirm`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

/// Freshly issued tokens.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Successful authentication response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: Identity,
}

/// Response of `POST /auth/session`. Tokens are present only when a new
/// anonymous identity was established.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: Option<TokenPair>,
    pub user: Identity,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/session
///
/// Resume the caller's session, or silently establish an anonymous identity
/// when there is none.
pub async fn session(
    State(state): State<AppState>,
    MaybeAuthUser(current): MaybeAuthUser,
) -> AppResult<Json<SessionResponse>> {
    if let Some(auth) = current {
        if let Some(user) = state.identities.find_user(auth.user_id).await? {
            return Ok(Json(SessionResponse {
                tokens: None,
                user: user.identity(),
            }));
        }
        tracing::info!(user_id = auth.user_id, "Token refers to a missing identity");
    }

    let response = establish_anonymous(&state).await?;
    Ok(Json(SessionResponse {
        tokens: Some(response.tokens),
        user: response.user,
    }))
}

/// POST /api/v1/auth/anonymous
///
/// Explicit anonymous sign-in.
pub async fn anonymous(State(state): State<AppState>) -> AppResult<Json<AuthResponse>> {
    Ok(Json(establish_anonymous(&state).await?))
}

/// POST /api/v1/auth/signup
///
/// Register an email/password identity. Returns 201 with tokens.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&input.email)?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    let user = state
        .identities
        .create_registered(&email, &password_hash)
        .await?;
    tracing::info!(user_id = user.id, "Account created");

    let response = create_auth_response(&state, &user).await?;
    publish_identity(&state, user.id, IdentityChange::SignedUp);
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<CredentialsRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = input.email.trim().to_lowercase();

    // 1. Find the account; anonymous identities have no password.
    let user = state
        .identities
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;
    let stored_hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;

    // 2. Check if the account is temporarily locked.
    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is temporarily locked. Try again later.".into(),
            )));
        }
    }

    // 3. Verify password.
    let password_valid = verify_password(&input.password, stored_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        // 4. On failure: count it, lock once the threshold is reached.
        let lock_until = (user.failed_login_count + 1 >= MAX_FAILED_ATTEMPTS)
            .then(|| Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS));
        if lock_until.is_some() {
            tracing::warn!(user_id = user.id, "Account locked after repeated failed logins");
        }
        state
            .identities
            .record_failed_login(user.id, lock_until)
            .await?;
        return Err(invalid_credentials());
    }

    // 5. On success: reset the counter and issue tokens.
    state.identities.record_successful_login(user.id).await?;
    let response = create_auth_response(&state, &user).await?;
    publish_identity(&state, user.id, IdentityChange::SignedIn);
    Ok(Json(response))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a valid refresh token for new access + refresh tokens.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = hash_token(&input.refresh_token);

    let session = state
        .identities
        .find_active_session(&token_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    // Token rotation: the presented token is single-use.
    state.identities.revoke_session(session.id).await?;

    let user = state
        .identities
        .find_user(session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    Ok(Json(create_auth_response(&state, &user).await?))
}

/// POST /api/v1/auth/logout
///
/// Revoke all sessions for the authenticated identity. Returns 204 No Content.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    let revoked = state
        .identities
        .revoke_all_sessions(auth_user.user_id)
        .await?;
    tracing::info!(user_id = auth_user.user_id, revoked, "Signed out");
    publish_identity(&state, auth_user.user_id, IdentityChange::SignedOut);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/password-reset
///
/// Always answers 202 so the response does not reveal whether the email is
/// registered. A reset link is mailed when it is.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(input): Json<PasswordResetRequest>,
) -> AppResult<StatusCode> {
    let email = input.email.trim().to_lowercase();
    let Some(user) = state.identities.find_user_by_email(&email).await? else {
        return Ok(StatusCode::ACCEPTED);
    };
    if user.is_anonymous {
        return Ok(StatusCode::ACCEPTED);
    }

    let (token, token_hash) = generate_opaque_token();
    state
        .identities
        .create_reset_token(CreatePasswordReset {
            user_id: user.id,
            token_hash,
            expires_at: Utc::now() + chrono::Duration::minutes(RESET_TOKEN_EXPIRY_MINS),
        })
        .await?;

    let link = format!(
        "{}/reset-password?token={token}",
        state.config.public_base_url
    );
    let email = OutgoingEmail {
        to: email,
        subject: "Reset your Photo Poet password".into(),
        body: format!(
            "Someone asked to reset the password for your Photo Poet account.\n\n\
             Open this link within {RESET_TOKEN_EXPIRY_MINS} minutes to choose a new one:\n{link}\n\n\
             If this wasn't you, you can ignore this message."
        ),
    };
    if let Err(e) = state.mailer.send(email).await {
        tracing::error!(user_id = user.id, error = %e, "Failed to send password reset email");
    }
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/auth/password-reset/confirm
///
/// Redeem a reset token, set the new password, and sign out everywhere.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(input): Json<PasswordResetConfirm>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.new_password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let user_id = state
        .identities
        .consume_reset_token(&hash_token(&input.token))
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(
                "Invalid or expired reset token".into(),
            ))
        })?;

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    if !state
        .identities
        .update_password(user_id, &password_hash)
        .await?
    {
        return Err(AppError::Core(CoreError::Validation(
            "Invalid or expired reset token".into(),
        )));
    }
    state.identities.revoke_all_sessions(user_id).await?;
    tracing::info!(user_id, "Password reset");
    publish_identity(&state, user_id, IdentityChange::PasswordReset);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<Json<Identity>> {
    let user = state
        .identities
        .find_user(auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;
    Ok(Json(user.identity()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn establish_anonymous(state: &AppState) -> AppResult<AuthResponse> {
    let user = state.identities.create_anonymous().await?;
    tracing::info!(user_id = user.id, "Anonymous identity established");
    let response = create_auth_response(state, &user).await?;
    publish_identity(state, user.id, IdentityChange::Anonymous);
    Ok(response)
}

/// Generate access + refresh tokens, persist a session, and build the response.
async fn create_auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let jwt = &state.config.jwt;
    let access_token = generate_access_token(user.id, role_for(user.is_anonymous), jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let (refresh_plaintext, refresh_hash) = generate_opaque_token();
    state
        .identities
        .create_session(CreateSession {
            user_id: user.id,
            refresh_token_hash: refresh_hash,
            expires_at: Utc::now() + chrono::Duration::days(jwt.refresh_token_expiry_days),
        })
        .await?;

    Ok(AuthResponse {
        tokens: TokenPair {
            access_token,
            refresh_token: refresh_plaintext,
            expires_in: jwt.access_token_expiry_mins * 60,
        },
        user: user.identity(),
    })
}

fn publish_identity(state: &AppState, user_id: DbId, change: IdentityChange) {
    state
        .event_bus
        .publish(AppEvent::identity_changed(user_id, change));
}

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into()))
}

/// Trim and lowercase an email, rejecting values without a local part and
/// a domain.
fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Core(CoreError::Validation(
            "A valid email address is required".into(),
        )));
    }
    Ok(email)
}
