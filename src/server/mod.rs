//! HTTP surface: conversion, preview, upload and health endpoints under
//! `/api`, plus the static landing page.

pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::render::RenderBackend;
use crate::validate::MAX_CONTENT_BYTES;

/// Room for the JSON envelope and multipart framing around the payload.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Shared application state accessible to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn RenderBackend>,
    /// Applied to every `/api` route.
    pub general_limiter: Arc<RateLimiter>,
    /// Applied to `/api/convert` on top of the general limiter.
    pub conversion_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        general_limiter: Arc<RateLimiter>,
        conversion_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            backend,
            general_limiter,
            conversion_limiter,
        }
    }
}

/// Build the full router. Files under `static_dir` are served for any path
/// outside `/api`.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let convert = Router::new()
        .route("/convert", post(handlers::convert))
        .route_layer(from_fn_with_state(
            state.conversion_limiter.clone(),
            middleware::rate_limit,
        ));

    let api = Router::new()
        .merge(convert)
        .route("/preview", post(handlers::preview))
        .route("/upload", post(handlers::upload))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_CONTENT_BYTES + BODY_OVERHEAD))
        .layer(from_fn_with_state(
            state.general_limiter.clone(),
            middleware::rate_limit,
        ));

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let state = AppState::new(
        Arc::new(config.render.backend()),
        config.general_limiter(),
        config.conversion_limiter(),
    );
    let sweepers = [
        state.general_limiter.spawn_sweeper(config.sweep_interval()),
        state.conversion_limiter.spawn_sweeper(config.sweep_interval()),
    ];

    let app = router(state, &config.static_dir);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!("printforge listening on {}", listener.local_addr()?);
    log::info!("Serving static files from {}", config.static_dir.display());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, shutting down gracefully"),
        _ = terminate => log::info!("SIGTERM received, shutting down gracefully"),
    }
}
