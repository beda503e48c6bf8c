//! HTTP server setup and configuration.

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use super::{handlers, history};
use crate::config::Config;
use crate::storage::EventLog;

/// Response header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Correlation id shared by every event of one call (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> HeaderValue {
        // A hyphenated UUID is always a valid header value.
        HeaderValue::from_str(&self.0).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub http_client: Client,
    pub config: Arc<Config>,
    pub events: Arc<EventLog>,
}

impl AppState {
    /// Build state from config: HTTP client plus the event log in the data dir.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.server.connect_timeout_secs))
            .build()?;

        let events = EventLog::open(&config.storage.data_dir)?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            events: Arc::new(events),
        })
    }
}

/// Create the axum router with all endpoints.
///
/// Unknown paths and unsupported methods both answer `404 {"error":"Not found"}`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .route(
            "/v1/models",
            get(handlers::list_models).fallback(handlers::not_found),
        )
        .route(
            "/v1/hub/history",
            get(history::history_handler).fallback(handlers::not_found),
        )
        .route(
            "/v1/chat/completions",
            post(handlers::chat_completions).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::new(config)?;

    tracing::info!(path = %state.events.path().display(), "Logging events");

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting vibehub gateway");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
