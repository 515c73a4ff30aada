//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::Config;
use crate::relay::UpstreamClient;
use crate::storage::{self, MessageStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: MessageStore,
    pub upstream: Arc<UpstreamClient>,
    pub idle_timeout: Duration,
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/messages", post(handlers::save_message))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state)
        // The original frontend is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until shutdown is requested.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let pool = storage::init_pool(&config.database.path).await?;
    tracing::info!(path = %config.database.path, "Database ready");

    // No request-level timeout here: stream liveness is governed by the
    // per-chunk idle timeout in the relay loop.
    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_secs))
        .build()?;

    let idle_timeout = Duration::from_secs(config.upstream.idle_timeout_secs);
    let state = AppState {
        store: MessageStore::new(pool.clone()),
        upstream: Arc::new(UpstreamClient::new(http_client, config.upstream)),
        idle_timeout,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting chatrelay server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing database pool");
    pool.close().await;

    Ok(())
}

/// Resolve when SIGINT (Ctrl+C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
