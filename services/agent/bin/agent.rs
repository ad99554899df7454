//! Main Entrypoint for the Bamboo Agent Worker
//!
//! This binary is responsible for:
//! 1. Resolving missing credentials from Secret Manager into the environment.
//! 2. Loading configuration from the environment.
//! 3. Constructing the shared worker state and dispatch router.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use bamboo_agent::{
    config::{GCP_PROJECT_VAR, SECRET_KEYS, Settings},
    router::create_router,
    state::AppState,
};
use bamboo_secrets::{ResolvePolicy, SecretManagerClient, resolve_missing};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load .env and initialize logging ---
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // --- 2. Resolve missing credentials ---
    // Environment values win; only unset keys are fetched, and a fetch
    // failure leaves the key unset for downstream consumers to report.
    let store = SecretManagerClient::new();
    let project = std::env::var(GCP_PROJECT_VAR).ok();
    resolve_missing(
        &store,
        project.as_deref(),
        &SECRET_KEYS,
        ResolvePolicy::FailOpen,
    )
    .await?;

    // --- 3. Load configuration and build shared state ---
    let settings = Arc::new(Settings::from_env().context("Failed to load configuration")?);
    info!(settings = ?settings, "Configuration loaded. Initializing worker state...");
    let app_state = Arc::new(AppState::new(settings.clone()));

    // --- 4. Create router and start server ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(app_state).layer(cors);

    info!(
        bind_address = %settings.bind_address,
        agent_identity = %settings.agent_identity,
        "Worker configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(settings.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
