// Main entry point for the API gateway

use anyhow::{Context, Result};
use bidding_core::domains::bidding::BiddingService;
use bidding_core::domains::store::RedisBidStore;
use bidding_core::kernel::{
    create_redis_pool, shutdown_signal, verify_connectivity, NatsEventPublisher,
};
use bidding_core::server::build_gateway_app;
use bidding_core::GatewayConfig;
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

    tracing::info!("Starting API Gateway");

    let config = GatewayConfig::from_env().context("Failed to load configuration")?;

    tracing::info!(strategy = %config.redis_strategy, "Connecting to Redis...");
    let redis_pool = create_redis_pool(&config.redis_url)?;
    verify_connectivity(&redis_pool)
        .await
        .context("Redis unreachable")?;
    let store = Arc::new(RedisBidStore::new(redis_pool, config.redis_strategy));
    tracing::info!("Redis connected");

    tracing::info!("Connecting to NATS...");
    let nats = async_nats::connect(&config.nats_url)
        .await
        .context("NATS unreachable")?;
    let publisher = Arc::new(NatsEventPublisher::new(nats));
    publisher
        .ensure_stream()
        .await
        .context("Failed to set up durable stream")?;
    tracing::info!("NATS connected");

    let bidding = Arc::new(BiddingService::new(store, publisher));
    let app = build_gateway_app(bidding);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "API gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped gracefully");
    Ok(())
}
