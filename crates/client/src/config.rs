use std::time::Duration;

use crate::error::ClientError;

/// Default request timeout. Generation waits on two model calls.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;

/// Where the API lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root without a trailing slash, e.g. `http://localhost:3000`.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load client configuration from environment variables.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `PHOTOPOET_API_URL`        | `http://localhost:3000` |
    /// | `PHOTOPOET_TIMEOUT_SECS`   | `90`                    |
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("PHOTOPOET_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let timeout_secs = match std::env::var("PHOTOPOET_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                ClientError::Config(format!("PHOTOPOET_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        Ok(Self {
            request_timeout: Duration::from_secs(timeout_secs),
            ..Self::new(base_url)
        })
    }

    /// Absolute URL of an API path such as `/auth/session`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    /// WebSocket URL of an API path: `http` becomes `ws`, `https` becomes
    /// `wss`.
    pub fn ws_url(&self, path: &str) -> Result<String, ClientError> {
        let http = self.api_url(path);
        if let Some(rest) = http.strip_prefix("https://") {
            Ok(format!("wss://{rest}"))
        } else if let Some(rest) = http.strip_prefix("http://") {
            Ok(format!("ws://{rest}"))
        } else {
            Err(ClientError::Config(format!(
                "Base URL must start with http:// or https://: {}",
                self.base_url
            )))
        }
    }
}
