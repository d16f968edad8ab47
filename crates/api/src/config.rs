use photopoet_ai::ModelConfig;

use crate::auth::jwt::JwtConfig;

/// Default upper bound for an uploaded photo (10 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `90`). Covers both model calls.
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight work after the listener stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted multipart upload in bytes.
    pub max_upload_bytes: usize,
    /// Externally visible origin, used to build share and reset links.
    pub public_base_url: String,
    /// Postgres connection string. `None` runs on in-memory stores.
    pub database_url: Option<String>,
    /// Filesystem blob store settings.
    pub blob: BlobConfig,
    /// Hosted model endpoint.
    pub model: ModelConfig,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
}

/// Where uploaded photos are written and served from.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Directory holding blobs (default: `./data/blobs`).
    pub root: String,
    /// URL prefix the blobs are served under (default: `{PUBLIC_BASE_URL}/blobs`).
    pub public_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                     |
    /// |------------------------|---------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                   |
    /// | `PORT`                 | `3000`                                      |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`                     |
    /// | `REQUEST_TIMEOUT_SECS` | `90`                                        |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                                        |
    /// | `MAX_UPLOAD_BYTES`     | `10485760`                                  |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:{PORT}`                   |
    /// | `DATABASE_URL`         | unset (in-memory stores)                    |
    /// | `BLOB_ROOT`            | `./data/blobs`                              |
    /// | `BLOB_PUBLIC_URL`      | `{PUBLIC_BASE_URL}/blobs`                   |
    /// | `MODEL_API_URL`        | `https://generativelanguage.googleapis.com` |
    /// | `MODEL_API_KEY`        | unset                                       |
    /// | `MODEL_NAME`           | `gemini-2.0-flash`                          |
    /// | `MODEL_TIMEOUT_SECS`   | `40`                                        |
    ///
    /// JWT settings are read by [`JwtConfig::from_env`]; SMTP settings by
    /// `photopoet_events::EmailConfig::from_env`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "90".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("MAX_UPLOAD_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let blob = BlobConfig {
            root: std::env::var("BLOB_ROOT").unwrap_or_else(|_| "./data/blobs".into()),
            public_url: std::env::var("BLOB_PUBLIC_URL")
                .unwrap_or_else(|_| format!("{public_base_url}/blobs")),
        };

        let model = ModelConfig {
            api_url: std::env::var("MODEL_API_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            api_key: std::env::var("MODEL_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("MODEL_NAME").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            timeout_secs: std::env::var("MODEL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "40".into())
                .parse()
                .expect("MODEL_TIMEOUT_SECS must be a valid u64"),
        };

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            public_base_url,
            database_url,
            blob,
            model,
            jwt,
        }
    }

    /// Whether blobs are served by this process under `/blobs`.
    pub fn serves_blobs_locally(&self) -> bool {
        self.blob.public_url == format!("{}/blobs", self.public_base_url)
    }
}
