pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::llm::TransformEngine;
use crate::stages::PipelineConfig;

/// Shared, read-only state; each request owns its own sequences
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn TransformEngine>,
    pub config: Arc<PipelineConfig>,
}

impl AppState {
    pub fn new(engine: Arc<dyn TransformEngine>, config: PipelineConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/transcript/format", post(routes::format_transcript))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("Server error")
}
