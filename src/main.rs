//! logbook-gateway server entry point.
//!
//! Starts the Axum HTTP server with the logbook REST endpoints.

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use logbook_gateway::api;
use logbook_gateway::app_state::AppState;
use logbook_gateway::config::GatewayConfig;
use logbook_gateway::domain::{ActionSignal, EventBus, Subscription, signal};

/// Subscribes a logger to every server signal topic.
fn log_signals(signals: &EventBus<ActionSignal>) -> Vec<Subscription<ActionSignal>> {
    signal::ALL_TOPICS
        .iter()
        .map(|topic| {
            signals.subscribe_fn(*topic, |s: &ActionSignal| {
                tracing::info!(
                    topic = s.topic(),
                    logbook_id = %s.logbook_id(),
                    signal = ?s,
                    "signal"
                );
            })
        })
        .collect()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json for structured output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;
    tracing::info!(
        addr = %config.listen_addr,
        lock_ttl_secs = config.lock_ttl_secs,
        trust_forwarded_for = config.trust_forwarded_for,
        "starting logbook-gateway"
    );

    // Build domain and service layers
    let signals = EventBus::new();
    let _signal_log = log_signals(&signals);
    let app_state = AppState::new(&config, signals);

    // Build router
    let app = api::build_app(app_state, config.request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
