//! FormPilot AI REST API entry point.
//!
//! Initializes tracing, wires the application state from the environment,
//! starts the session expiry sweeper, and serves the API.

mod http;
mod state;

use std::time::Duration;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let enable_otel = std::env::var("FORMPILOT_OTEL")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    formpilot_observe::tracing_setup::init_tracing(enable_otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init();
    let bind_addr = format!("{}:{}", state.config.backend_host, state.config.backend_port);

    tracing::info!(
        addr = %bind_addr,
        session_timeout_sec = state.config.session_timeout_sec,
        "FormPilot AI backend starting up"
    );

    // Periodic expiry sweep so idle sessions do not pile up between
    // lookups (expiry is also checked on access).
    let sweeper_store = state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweeper_store.sweep_expired();
        }
    });

    let router = http::router::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

    formpilot_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
