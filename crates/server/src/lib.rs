//! HTTP transport for kernhash.
//!
//! The server exposes exactly the surface the search core offers: one search
//! endpoint taking a raw kern query document and a required voice index, a
//! stats endpoint, and liveness. Everything else (corpus ingestion, index
//! construction) happens before the router is built; the handlers only read.

mod config;
mod error;
mod routes;
mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use state::ServerState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use kern_match::SearchEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the axum router with all routes and middleware.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(routes::api_info))
        .route("/health", get(routes::health))
        .route("/api/v1/search", post(routes::search))
        .route("/api/v1/stats", get(routes::stats))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.timeout_secs,
        )))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the kernhash HTTP server and block until shutdown.
///
/// The engine is built by the caller (after corpus ingestion) so the server
/// itself holds no storage-backend knowledge. Shuts down gracefully on
/// ctrl-c or SIGTERM.
pub async fn start_server(config: ServerConfig, engine: Arc<SearchEngine>) -> anyhow::Result<()> {
    let addr: SocketAddr = config.socket_addr()?;
    let state = Arc::new(ServerState::new(config, engine));
    let app = build_router(state);

    tracing::info!(%addr, "starting kernhash server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
