//! HTTP server setup and routing

use crate::engine::RadioEngine;
use crate::error::{Error, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<RadioEngine>,
    pub port: u16,
}

/// Build the router with all routes attached to `ctx`
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))

        // Renderer view and full snapshot
        .route("/playback/status", get(super::handlers::get_renderer_status))
        .route("/playback/state", get(super::handlers::get_playback_state))

        // Commands
        .route("/playback/sequence", post(super::handlers::start_sequence))
        .route("/playback/advance", post(super::handlers::advance))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/resume", post(super::handlers::resume))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/skip", post(super::handlers::skip))

        // Renderer callbacks
        .route("/playback/callbacks/narration-finished", post(super::handlers::narration_finished))
        .route("/playback/callbacks/track-finished", post(super::handlers::track_finished))
        .route("/playback/callbacks/track-failed", post(super::handlers::track_failed))
        .route("/playback/callbacks/progress", post(super::handlers::report_progress))

        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
