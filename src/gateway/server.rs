//! Listener lifecycle: bind, serve, drain, shut down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;

use super::api::{AppState, api_router};
use crate::client::WorkflowClient;
use crate::runtime::{Engine, SystemClock};
use crate::workflow::CaseTimeouts;

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub timeouts: CaseTimeouts,
    /// How often the background sweeper fires due deadline timers.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:8081".to_string(),
            timeouts: CaseTimeouts::default(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Build the application router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    api_router().with_state(state)
}

/// Start the gateway: one engine, one long-lived client, one listener.
/// Returns after a graceful drain on ctrl-c.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let engine = Arc::new(Engine::new(Arc::new(SystemClock), config.timeouts));
    let state = Arc::new(AppState {
        client: WorkflowClient::connect(engine.clone()),
    });

    // Deadline timers also apply lazily on every request; the sweeper covers
    // quiet periods.
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.sweep() {
                tracing::error!(error = %e, "deadline sweep failed");
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "background-check gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
