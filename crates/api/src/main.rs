use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use photopoet_ai::ModelClient;
use photopoet_api::config::ServerConfig;
use photopoet_api::router::build_app_router;
use photopoet_api::state::{AppState, Backends};
use photopoet_db::{CreationStore, IdentityStore, MemoryStore, PgStore};
use photopoet_events::{EmailConfig, EmailDelivery, LogMailer, Mailer};
use photopoet_storage::LocalBlobStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "photopoet_api=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Stores ---
    let (creations, identities): (Arc<dyn CreationStore>, Arc<dyn IdentityStore>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = photopoet_db::create_pool(database_url)
                    .await
                    .expect("Failed to connect to database");
                tracing::info!("Database connection pool created");

                photopoet_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Database migrations applied");

                let store = Arc::new(PgStore::new(pool));
                (store.clone() as Arc<dyn CreationStore>, store as Arc<dyn IdentityStore>)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory stores (data is lost on exit)");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn CreationStore>, store as Arc<dyn IdentityStore>)
            }
        };

    // --- Blob store ---
    tokio::fs::create_dir_all(&config.blob.root)
        .await
        .expect("Failed to create BLOB_ROOT directory");
    let blobs = Arc::new(LocalBlobStore::new(
        config.blob.root.clone(),
        config.blob.public_url.clone(),
    ));
    tracing::info!(root = %config.blob.root, url = %config.blob.public_url, "Blob store ready");

    // --- Model client ---
    if config.model.api_key.is_none() {
        tracing::warn!("MODEL_API_KEY not set, model requests will likely be rejected");
    }
    let model = Arc::new(
        ModelClient::new(config.model.clone()).expect("Failed to build model client"),
    );
    tracing::info!(model = %config.model.model, "Model client ready");

    // --- Mail ---
    let mailer: Arc<dyn Mailer> = match EmailConfig::from_env() {
        Some(email_config) => {
            tracing::info!(host = %email_config.smtp_host, "SMTP delivery enabled");
            Arc::new(EmailDelivery::new(email_config))
        }
        None => {
            tracing::info!("SMTP_HOST not set, outgoing mail will be logged");
            Arc::new(LogMailer)
        }
    };

    // --- App state ---
    let state = AppState::new(
        config.clone(),
        Backends {
            creations,
            identities,
            blobs,
            extractor: model.clone(),
            generator: model,
            mailer,
        },
    );

    let orchestrator = Arc::clone(&state.orchestrator);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");

    // Creations still being saved in the background.
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if !orchestrator.drain(grace).await {
        tracing::warn!(
            grace_secs = config.shutdown_timeout_secs,
            "Some creations were still saving at shutdown"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
