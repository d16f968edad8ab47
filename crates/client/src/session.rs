//! Session provider: who the client is acting as.
//!
//! The state starts as loading with no identity. [`SessionProvider::initialize`]
//! resumes a stored session or silently establishes an anonymous identity,
//! so after loading there is always an identity unless the server could not
//! be reached. Signing out falls back to a fresh anonymous identity the same
//! way.

use std::sync::Arc;

use photopoet_core::identity::Identity;
use serde_json::json;
use tokio::sync::watch;

use crate::api::{ApiClient, AuthResponse, SessionResponse};
use crate::error::ClientError;

/// Snapshot of the session as consumers see it.
///
/// `loading` and "no identity" are distinct: while loading, identity-scoped
/// operations must wait; once loaded without an identity, they fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub identity: Option<Identity>,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            loading: true,
            identity: None,
        }
    }

    fn ready(identity: Option<Identity>) -> Self {
        Self {
            loading: false,
            identity,
        }
    }

    /// The identity to scope an operation to.
    pub fn require_identity(&self) -> Result<&Identity, ClientError> {
        if self.loading {
            return Err(ClientError::SessionLoading);
        }
        self.identity.as_ref().ok_or(ClientError::NotSignedIn)
    }
}

/// Owns the session state and publishes every change.
pub struct SessionProvider {
    api: Arc<ApiClient>,
    state: watch::Sender<SessionState>,
}

impl SessionProvider {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self { api, state }
    }

    /// Current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Identity-changed stream. The receiver sees the current state first.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The identity to scope an operation to, or why there is none.
    pub fn identity(&self) -> Result<Identity, ClientError> {
        self.state.borrow().require_identity().cloned()
    }

    /// Wait until loading finishes and return the resulting identity.
    pub async fn wait_ready(&self) -> Result<Identity, ClientError> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| !state.loading)
            .await
            .map_err(|_| ClientError::NotSignedIn)?;
        state.require_identity().cloned()
    }

    pub(crate) fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    // ---- lifecycle ----

    /// Resume the stored session, or establish an anonymous one.
    pub async fn initialize(&self) -> Result<Identity, ClientError> {
        self.set(SessionState::loading());
        let result: Result<SessionResponse, ClientError> =
            self.api.post_json("/auth/session", &json!({})).await;
        match result {
            Ok(response) => {
                if let Some(tokens) = response.tokens() {
                    self.api.set_tokens(&tokens);
                }
                tracing::info!(
                    user_id = response.user.id,
                    anonymous = response.user.is_anonymous,
                    "Session ready"
                );
                self.set(SessionState::ready(Some(response.user.clone())));
                Ok(response.user)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error establishing session");
                self.set(SessionState::ready(None));
                Err(e)
            }
        }
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let response: AuthResponse = self
            .api
            .post_json(
                "/auth/login",
                &json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(self.adopt(response))
    }

    /// Register an email/password account and sign in as it.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let response: AuthResponse = self
            .api
            .post_json(
                "/auth/signup",
                &json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(self.adopt(response))
    }

    /// Sign out everywhere, then continue as a new anonymous identity.
    pub async fn sign_out(&self) -> Result<Identity, ClientError> {
        if self.api.access_token().is_some() {
            if let Err(e) = self.api.post_no_content("/auth/logout", &json!({})).await {
                tracing::warn!(error = %e, "Server sign-out failed, dropping local session");
            }
        }
        self.api.clear_tokens();
        self.initialize().await
    }

    /// Ask for a password reset email. The server answers the same whether
    /// or not the account exists.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        self.api
            .post_no_content("/auth/password-reset", &json!({ "email": email }))
            .await
    }

    /// Redeem a reset token from the email.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        self.api
            .post_no_content(
                "/auth/password-reset/confirm",
                &json!({ "token": token, "new_password": new_password }),
            )
            .await
    }

    /// Rotate the refresh token now.
    pub async fn refresh(&self) -> Result<Identity, ClientError> {
        let response = self.api.refresh().await?;
        Ok(self.adopt(response))
    }

    fn adopt(&self, response: AuthResponse) -> Identity {
        self.api.set_tokens(&response.tokens);
        tracing::info!(user_id = response.user.id, "Signed in");
        self.set(SessionState::ready(Some(response.user.clone())));
        response.user
    }

    fn set(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}
