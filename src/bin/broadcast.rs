// Main entry point for the broadcast service

use anyhow::{Context, Result};
use bidding_core::domains::broadcast::{ingress, Registry};
use bidding_core::kernel::shutdown_signal;
use bidding_core::server::build_broadcast_app;
use bidding_core::BroadcastConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bidding_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    tracing::info!("Starting Broadcast Service");

    let config = BroadcastConfig::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to NATS...");
    let nats = async_nats::connect(&config.nats_url)
        .await
        .context("NATS unreachable")?;
    tracing::info!("NATS connected");

    let registry = Arc::new(Registry::new());

    let ingress_registry = Arc::clone(&registry);
    let ingress_task = tokio::spawn(async move {
        if let Err(e) = ingress::run(nats, ingress_registry).await {
            tracing::error!(error = %e, "live event ingress failed");
        }
    });

    let app = build_broadcast_app(Arc::clone(&registry));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Broadcast service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Evict everyone so the egress tasks send close frames, then stop
    // pulling from NATS
    registry.shutdown();
    ingress_task.abort();

    tracing::info!("Server stopped gracefully");
    Ok(())
}
