//! Shared helpers for API integration tests.
//!
//! Every test gets its own in-memory stores, stub model and outbox mailer, so
//! tests never share state and need no database or network.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use photopoet_ai::{
    AiError, GeneratedPoem, ModelConfig, PhotoAnalysis, PoemGenerator, PoemRequest, ThemeExtractor,
};
use photopoet_api::auth::jwt::JwtConfig;
use photopoet_api::config::{BlobConfig, ServerConfig};
use photopoet_api::router::build_app_router;
use photopoet_api::state::{AppState, Backends};
use photopoet_core::data_uri::EncodedPhoto;
use photopoet_db::MemoryStore;
use photopoet_events::OutboxMailer;
use photopoet_storage::MemoryBlobStore;
use serde_json::Value;
use tower::ServiceExt;

/// Public base URL used in links the server builds.
pub const BASE_URL: &str = "http://localhost:3000";

/// Bytes of the fake photo every upload sends.
pub const PHOTO_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const BOUNDARY: &str = "photopoet-test-boundary";

/// Build a test `ServerConfig` with sensible defaults.
///
/// Blobs are served from a non-local URL so no static file service is
/// mounted.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        public_base_url: BASE_URL.to_string(),
        database_url: None,
        blob: BlobConfig {
            root: "./unused-in-tests".to_string(),
            public_url: "memory://blobs".to_string(),
        },
        model: ModelConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            model: "stub".to_string(),
            timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 30,
        },
    }
}

// ---------------------------------------------------------------------------
// Stub model
// ---------------------------------------------------------------------------

/// Extractor returning a fixed analysis after an optional delay.
pub struct StubExtractor {
    reply: PhotoAnalysis,
    delay: Duration,
}

impl StubExtractor {
    pub fn returning(themes: &str, emotions: &str) -> Self {
        Self {
            reply: PhotoAnalysis {
                themes: themes.into(),
                emotions: emotions.into(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ThemeExtractor for StubExtractor {
    async fn extract(&self, _photo: &EncodedPhoto) -> Result<PhotoAnalysis, AiError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone().validated()
    }
}

/// Generator returning a fixed poem, or failing the next call.
pub struct StubGenerator {
    poem: String,
    failure: Mutex<Option<AiError>>,
    /// Styles requested so far.
    pub seen_styles: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn returning(poem: &str) -> Self {
        Self {
            poem: poem.into(),
            failure: Mutex::new(None),
            seen_styles: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: AiError) -> Self {
        Self {
            poem: String::new(),
            failure: Mutex::new(Some(err)),
            seen_styles: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PoemGenerator for StubGenerator {
    async fn generate(&self, request: &PoemRequest) -> Result<GeneratedPoem, AiError> {
        if let Some(style) = request.style {
            self.seen_styles.lock().unwrap().push(style.to_string());
        }
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(GeneratedPoem {
            poem: self.poem.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test app
// ---------------------------------------------------------------------------

/// A router plus handles on its backends.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub mailer: Arc<OutboxMailer>,
    pub generator: Arc<StubGenerator>,
}

/// App whose model describes a mountain lake and answers with a haiku.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        StubExtractor::returning("mountains, solitude, water", "peace, awe"),
        StubGenerator::returning("still water listens\nto the mountain's slow breathing\nclouds cross, unhurried"),
    )
}

/// App with the given stub model.
pub fn build_test_app_with(extractor: StubExtractor, generator: StubGenerator) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new(config.blob.public_url.clone()));
    let mailer = Arc::new(OutboxMailer::new());
    let generator = Arc::new(generator);

    let state = AppState::new(
        config.clone(),
        Backends {
            creations: store.clone(),
            identities: store.clone(),
            blobs: blobs.clone(),
            extractor: Arc::new(extractor),
            generator: generator.clone(),
            mailer: mailer.clone(),
        },
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        blobs,
        mailer,
        generator,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

fn with_auth(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    builder.header("authorization", format!("Bearer {token}"))
}

/// Send a GET request.
pub async fn get(app: &Router, uri: &str) -> axum::response::Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

/// Send an authenticated GET request.
pub async fn get_auth(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    let request = with_auth(Request::get(uri), token).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> axum::response::Response {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send an authenticated POST request with a JSON body.
pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    body: Value,
    token: &str,
) -> axum::response::Response {
    let request = with_auth(Request::post(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send an authenticated POST request with no body.
pub async fn post_auth(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    let request = with_auth(Request::post(uri), token).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Send an authenticated PATCH request with a JSON body.
pub async fn patch_json_auth(
    app: &Router,
    uri: &str,
    body: Value,
    token: &str,
) -> axum::response::Response {
    let request = with_auth(Request::patch(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send an authenticated DELETE request.
pub async fn delete_auth(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    let request = with_auth(Request::delete(uri), token).body(Body::empty()).unwrap();
    send(app, request).await
}

/// A multipart form part.
pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send an authenticated multipart POST.
pub async fn post_multipart_auth(
    app: &Router,
    uri: &str,
    parts: &[Part<'_>],
    token: &str,
) -> axum::response::Response {
    let request = with_auth(Request::post(uri), token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

/// Submit `PHOTO_BYTES` as `file_name` with the given style.
pub async fn generate(
    app: &Router,
    token: &str,
    file_name: &str,
    style: Option<&str>,
) -> axum::response::Response {
    let mut parts = vec![Part::File {
        name: "photo",
        file_name,
        content_type: "image/png",
        bytes: PHOTO_BYTES,
    }];
    if let Some(style) = style {
        parts.push(Part::Text {
            name: "style",
            value: style,
        });
    }
    post_multipart_auth(app, "/api/v1/generations", &parts, token).await
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Collect the response body into raw bytes.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect the response body and parse it as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Establish an anonymous identity and return its access token and id.
pub async fn anonymous_session(app: &Router) -> (String, i64) {
    let response = post_json(app, "/api/v1/auth/anonymous", serde_json::json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    (
        json["access_token"].as_str().unwrap().to_string(),
        json["user"]["id"].as_i64().unwrap(),
    )
}

/// Establish an anonymous identity and return its access token.
pub async fn anonymous_token(app: &Router) -> String {
    anonymous_session(app).await.0
}

/// Register an account and return the full auth response.
pub async fn signup(app: &Router, email: &str, password: &str) -> Value {
    let response = post_json(
        app,
        "/api/v1/auth/signup",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Poll the history until it holds `count` records, then return them.
pub async fn wait_for_history(app: &Router, token: &str, count: usize) -> Vec<Value> {
    for _ in 0..100 {
        let response = get_auth(app, "/api/v1/creations", token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let items = body_json(response).await["data"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        if items.len() >= count {
            return items;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("history never reached {count} records");
}
