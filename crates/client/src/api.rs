//! REST transport for the Photo Poet API.
//!
//! Wraps [`reqwest`] with bearer-token handling. The access token is
//! refreshed shortly before it expires, so callers never see a 401 from an
//! aged token.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use photopoet_core::identity::Identity;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorBody};

/// Refresh the access token when it has less than this left.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Tokens issued by sign-in, sign-up, anonymous sign-in and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Body of a successful authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: Identity,
}

/// Body of `POST /auth/session`. Tokens are present only when a new
/// anonymous identity was established.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Identity,
}

impl SessionResponse {
    pub fn tokens(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            expires_in: self.expires_in?,
        })
    }
}

/// `{ "data": ... }` envelope used by resource endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Data<T> {
    pub data: T,
}

/// Raw bytes of a file download.
#[derive(Debug, Clone)]
pub(crate) struct RawDownload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredTokens {
    access_token: String,
    refresh_token: String,
    expires_at: Instant,
}

/// HTTP client for one Photo Poet server and one session.
pub struct ApiClient {
    client: reqwest::Client,
    config: ClientConfig,
    tokens: RwLock<Option<StoredTokens>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            client,
            config,
            tokens: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---- tokens ----

    pub fn set_tokens(&self, tokens: &TokenPair) {
        let expires_in = Duration::from_secs(tokens.expires_in.max(0).unsigned_abs());
        let stored = StoredTokens {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: Instant::now() + expires_in,
        };
        if let Ok(mut slot) = self.tokens.write() {
            *slot = Some(stored);
        }
    }

    pub fn clear_tokens(&self) {
        if let Ok(mut slot) = self.tokens.write() {
            *slot = None;
        }
    }

    /// Current access token, without refreshing.
    pub fn access_token(&self) -> Option<String> {
        self.stored().map(|t| t.access_token)
    }

    fn stored(&self) -> Option<StoredTokens> {
        self.tokens.read().ok().and_then(|slot| slot.clone())
    }

    /// An access token that is not about to expire, refreshing it first if
    /// needed. A failed refresh keeps the old token; the server decides.
    pub async fn fresh_access_token(&self) -> Option<String> {
        let stored = self.stored()?;
        if stored.expires_at > Instant::now() + REFRESH_MARGIN {
            return Some(stored.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let stored = self.stored()?;
        if stored.expires_at > Instant::now() + REFRESH_MARGIN {
            return Some(stored.access_token);
        }
        match self.exchange_refresh_token(&stored.refresh_token).await {
            Ok(response) => Some(response.tokens.access_token),
            Err(e) => {
                tracing::warn!(error = %e, "Access token refresh failed");
                Some(stored.access_token)
            }
        }
    }

    /// Rotate the refresh token and store the new pair.
    pub async fn refresh(&self) -> Result<AuthResponse, ClientError> {
        let _guard = self.refresh_lock.lock().await;
        let stored = self.stored().ok_or(ClientError::NotSignedIn)?;
        self.exchange_refresh_token(&stored.refresh_token).await
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, ClientError> {
        let response = self
            .client
            .post(self.config.api_url("/auth/refresh"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let auth: AuthResponse = Self::parse_response(response).await?;
        self.set_tokens(&auth.tokens);
        Ok(auth)
    }

    // ---- requests ----

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.config.api_url(path));
        match self.fresh_access_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(Method::GET, path).await.send().await?;
        Self::parse_response(response).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(Method::POST, path)
            .await
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// POST whose success answer carries no body (202/204).
    pub(crate) async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        let response = self
            .request(Method::POST, path)
            .await
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    pub(crate) async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(Method::PATCH, path)
            .await
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let response = self.request(Method::DELETE, path).await.send().await?;
        Self::check_status(response).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ClientError> {
        let response = self
            .request(Method::POST, path)
            .await
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub(crate) async fn get_download(&self, path: &str) -> Result<RawDownload, ClientError> {
        let response = self.request(Method::GET, path).await.send().await?;
        let response = Self::ensure_success(response).await?;
        let file_name =
            header_value(&response, CONTENT_DISPOSITION).and_then(|v| attachment_file_name(&v));
        let content_type = header_value(&response, CONTENT_TYPE);
        let bytes = response.bytes().await?.to_vec();
        Ok(RawDownload {
            file_name,
            content_type,
            bytes,
        })
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or turn the server's
    /// `{error, code}` body into [`ClientError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ErrorBody::into_error(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn header_value(response: &reqwest::Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Filename from `attachment; filename="..."`.
fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix("filename=")
            .map(|name| name.trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    })
}
