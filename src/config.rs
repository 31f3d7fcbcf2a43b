use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::domains::store::Strategy;

/// API gateway configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub redis_url: String,
    pub redis_strategy: Strategy,
    pub nats_url: String,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            redis_url: redis_url_from_env(),
            redis_strategy: redis_strategy_from_env()?,
            nats_url: nats_url_from_env(),
        })
    }
}

/// Broadcast service configuration
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub listen_addr: String,
    pub nats_url: String,
}

impl BroadcastConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string()),
            nats_url: nats_url_from_env(),
        })
    }
}

/// Archival worker configuration
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub database_url: String,
    pub nats_url: String,
}

impl ArchiverConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            nats_url: nats_url_from_env(),
        })
    }
}

/// Redis URL, with password and database index carried in the URL
/// (redis://:password@host:port/db).
fn redis_url_from_env() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn nats_url_from_env() -> String {
    env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

/// Contention strategy for the bid store. Fixed at startup; never
/// switched per request.
fn redis_strategy_from_env() -> Result<Strategy> {
    match env::var("REDIS_STRATEGY") {
        Ok(s) => s
            .parse()
            .with_context(|| format!("invalid REDIS_STRATEGY {s:?}")),
        Err(_) => Ok(Strategy::AtomicScript),
    }
}
