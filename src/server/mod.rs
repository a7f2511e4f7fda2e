//! HTTP surface: wiring, startup, and shutdown.
//!
//! Handlers live in `api`; this module assembles the shared state (run
//! store, media store, engine with its HTTP adapters) and runs the axum
//! server with graceful shutdown.

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::adapters::AdapterSet;
use crate::config::AppConfig;
use crate::engine::WorkflowEngine;
use crate::storage::MediaStore;
use crate::store::RunStore;

use api::{AppState, SharedState};

/// Build the application router over already-constructed state.
pub fn build_router(state: SharedState) -> Router {
    api::api_router().with_state(state)
}

/// Assemble state from configuration: storage directories are created,
/// adapters point at the configured backends.
pub fn build_state(config: &AppConfig) -> Result<SharedState> {
    let media = Arc::new(
        MediaStore::new(&config.server.storage_dir).context("Failed to initialize media store")?,
    );
    let store = Arc::new(RunStore::new());
    let adapters = Arc::new(
        AdapterSet::http(config, Arc::clone(&media)).context("Failed to build stage adapters")?,
    );
    let engine = WorkflowEngine::new(
        Arc::clone(&store),
        adapters,
        config.pipeline.max_retries,
    );
    Ok(Arc::new(AppState {
        store,
        media,
        engine,
    }))
}

/// Start the server and block until shutdown.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;
    let mut app = build_router(state);

    if config.server.dev {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.server.dev { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        storage = %config.server.storage_dir.display(),
        max_retries = config.pipeline.max_retries,
        "atelier listening"
    );
    println!("Atelier running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}
