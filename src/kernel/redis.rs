//! Redis connection pool for the bid store.
//!
//! Pooled connections are required (not a shared multiplexed client)
//! because the optimistic strategy relies on `WATCH`, which is
//! per-connection state.

use anyhow::{Context, Result};
use deadpool_redis::{Pool, Runtime};

/// Pool sized for peak bidding concurrency.
const POOL_MAX_SIZE: usize = 100;

/// Build the Redis pool. Password and database index ride the URL
/// (`redis://:password@host:port/db`).
pub fn create_redis_pool(url: &str) -> Result<Pool> {
    deadpool_redis::Config::from_url(url)
        .builder()
        .context("invalid Redis configuration")?
        .max_size(POOL_MAX_SIZE)
        .runtime(Runtime::Tokio1)
        .build()
        .context("failed to build Redis pool")
}

/// Fail fast at startup when Redis is unreachable.
pub async fn verify_connectivity(pool: &Pool) -> Result<()> {
    let mut conn = pool.get().await.context("failed to get Redis connection")?;
    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("Redis ping failed")?;
    Ok(())
}
