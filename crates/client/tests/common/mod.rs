//! Shared helpers for client integration tests.
//!
//! Each test serves a fresh in-memory API on an ephemeral port and points a
//! client at it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use photopoet_ai::{
    AiError, GeneratedPoem, ModelConfig, PhotoAnalysis, PoemGenerator, PoemRequest, ThemeExtractor,
};
use photopoet_api::auth::jwt::JwtConfig;
use photopoet_api::config::{BlobConfig, ServerConfig};
use photopoet_api::router::build_app_router;
use photopoet_api::state::{AppState, Backends};
use photopoet_client::{ClientConfig, PhotoPoetClient, PhotoUpload};
use photopoet_core::data_uri::EncodedPhoto;
use photopoet_db::MemoryStore;
use photopoet_events::OutboxMailer;
use photopoet_storage::MemoryBlobStore;

pub const HAIKU: &str =
    "still water listens\nto the mountain's slow breathing\nclouds cross, unhurried";

fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        public_base_url: "http://localhost:3000".to_string(),
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
            secret: "test-secret-for-client-tests".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 30,
        },
    }
}

/// Extractor answering with a fixed analysis after `delay`.
pub struct StubExtractor {
    pub reply: PhotoAnalysis,
    pub delay: Duration,
}

#[async_trait]
impl ThemeExtractor for StubExtractor {
    async fn extract(&self, _photo: &EncodedPhoto) -> Result<PhotoAnalysis, AiError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone().validated()
    }
}

/// Generator answering with a fixed poem, or failing the next call.
pub struct StubGenerator {
    pub poem: String,
    pub failure: Mutex<Option<AiError>>,
}

#[async_trait]
impl PoemGenerator for StubGenerator {
    async fn generate(&self, _request: &PoemRequest) -> Result<GeneratedPoem, AiError> {
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(GeneratedPoem {
            poem: self.poem.clone(),
        })
    }
}

/// A running server and handles on its backends.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestServer {
    /// A fresh client pointed at this server. Not started.
    pub fn client(&self) -> PhotoPoetClient {
        PhotoPoetClient::new(ClientConfig::new(format!("http://{}", self.addr))).unwrap()
    }

    /// A started client with an anonymous identity.
    pub async fn started_client(&self) -> PhotoPoetClient {
        let client = self.client();
        client.start().await.unwrap();
        client
    }
}

/// Server whose model describes a mountain lake and answers with a haiku.
pub async fn serve() -> TestServer {
    serve_with(Duration::ZERO, None).await
}

/// Server whose analysis takes `delay` and whose first generation fails
/// with `failure` when given.
pub async fn serve_with(delay: Duration, failure: Option<AiError>) -> TestServer {
    let config = server_config();
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new(config.blob.public_url.clone()));
    let extractor = StubExtractor {
        reply: PhotoAnalysis {
            themes: "mountains, solitude, water".into(),
            emotions: "peace, awe".into(),
        },
        delay,
    };
    let generator = StubGenerator {
        poem: HAIKU.into(),
        failure: Mutex::new(failure),
    };
    let state = AppState::new(
        config.clone(),
        Backends {
            creations: store.clone(),
            identities: store.clone(),
            blobs: blobs.clone(),
            extractor: Arc::new(extractor),
            generator: Arc::new(generator),
            mailer: Arc::new(OutboxMailer::new()),
        },
    );
    let router = build_app_router(state, &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer { addr, store, blobs }
}

/// A small PNG-looking upload.
pub fn photo(file_name: &str) -> PhotoUpload {
    PhotoUpload::new(
        file_name,
        "image/png",
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    )
}
