// Main entry point for the archival worker

use anyhow::{Context, Result};
use bidding_core::domains::archive::{run_consumer, PostgresArchive};
use bidding_core::kernel::shutdown_signal;
use bidding_core::ArchiverConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bidding_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    tracing::info!("Starting Archival Worker");

    let config = ArchiverConfig::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to PostgreSQL...");
    let archive = PostgresArchive::connect(&config.database_url).await?;
    tracing::info!("Running database migrations...");
    archive.migrate().await?;
    tracing::info!("PostgreSQL ready");

    tracing::info!("Connecting to NATS...");
    let nats = async_nats::connect(&config.nats_url)
        .await
        .context("NATS unreachable")?;
    tracing::info!("NATS connected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let archive: Arc<dyn bidding_core::domains::archive::BidArchive> = Arc::new(archive);
    let mut consumer_task = tokio::spawn(run_consumer(nats, archive, shutdown_rx));

    tokio::select! {
        result = &mut consumer_task => {
            // The consumer only returns on its own when something broke
            result.context("consumer task panicked")??;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutting down worker...");
            let _ = shutdown_tx.send(true);
            consumer_task.await.context("consumer task panicked")??;
        }
    }

    tracing::info!("Worker stopped gracefully");
    Ok(())
}
