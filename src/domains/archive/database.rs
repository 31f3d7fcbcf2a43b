//! Relational archive of accepted bids.
//!
//! Two tables: `bids` is the append-only audit trail, `items` a
//! denormalized view of the current highest bid. Both writes tolerate
//! at-least-once delivery: the bid insert is idempotent on `bid_id`, and
//! the item update only applies when the event's amount beats the stored
//! one, so replay and reordering cannot move an item backwards.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::common::models::{Bid, BidEvent, BID_STATUS_ACCEPTED};

/// Archive operations consumed by the archival worker.
#[async_trait]
pub trait BidArchive: Send + Sync {
    /// Upsert the item view. Creates a placeholder row on first sight of
    /// an item; otherwise updates only when `event.amount` is strictly
    /// greater than the stored `current_bid`. Returns whether the row
    /// advanced.
    async fn update_item(&self, event: &BidEvent) -> Result<bool>;

    /// Append the audit row. Idempotent on `bid_id`.
    async fn insert_bid(&self, event: &BidEvent) -> Result<()>;

    /// Recent bids for an item, newest first.
    async fn bid_history(&self, item_id: &str, limit: i64) -> Result<Vec<Bid>>;
}

pub struct PostgresArchive {
    pool: PgPool,
}

impl PostgresArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the archiver's pool profile.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .max_lifetime(Duration::from_secs(5 * 60))
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BidArchive for PostgresArchive {
    async fn update_item(&self, event: &BidEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO items (id, current_bid, highest_bidder_id, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET current_bid = EXCLUDED.current_bid,
                highest_bidder_id = EXCLUDED.highest_bidder_id,
                updated_at = NOW()
            WHERE EXCLUDED.current_bid > items.current_bid
            "#,
        )
        .bind(&event.item_id)
        .bind(event.amount)
        .bind(&event.user_id)
        .execute(&self.pool)
        .await
        .context("failed to upsert item")?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_bid(&self, event: &BidEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bids (id, item_id, user_id, amount, timestamp, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.bid_id)
        .bind(&event.item_id)
        .bind(&event.user_id)
        .bind(event.amount)
        .bind(event.timestamp)
        .bind(BID_STATUS_ACCEPTED)
        .execute(&self.pool)
        .await
        .context("failed to insert bid")?;

        Ok(())
    }

    async fn bid_history(&self, item_id: &str, limit: i64) -> Result<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(
            r#"
            SELECT id, item_id, user_id, amount, timestamp, status
            FROM bids
            WHERE item_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(item_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to query bid history")?;

        Ok(bids)
    }
}

/// In-memory archive honoring the same contract, for tests. Can simulate
/// transient database failures.
#[derive(Default)]
pub struct MemoryArchive {
    bids: Mutex<HashMap<uuid::Uuid, Bid>>,
    items: Mutex<HashMap<String, (Decimal, String)>>,
    fail_times: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` operations fail as a transient database error.
    pub fn fail_next_operations(&self, n: usize) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    pub fn bid_count(&self) -> usize {
        self.bids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn item_view(&self, item_id: &str) -> Option<(Decimal, String)> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(item_id)
            .cloned()
    }

    fn check_failure(&self) -> Result<()> {
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("simulated database error"));
        }
        Ok(())
    }
}

#[async_trait]
impl BidArchive for MemoryArchive {
    async fn update_item(&self, event: &BidEvent) -> Result<bool> {
        self.check_failure()?;

        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        match items.get_mut(&event.item_id) {
            Some(entry) => {
                if event.amount > entry.0 {
                    *entry = (event.amount, event.user_id.clone());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                items.insert(
                    event.item_id.clone(),
                    (event.amount, event.user_id.clone()),
                );
                Ok(true)
            }
        }
    }

    async fn insert_bid(&self, event: &BidEvent) -> Result<()> {
        self.check_failure()?;

        self.bids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event.bid_id)
            .or_insert_with(|| Bid {
                id: event.bid_id,
                item_id: event.item_id.clone(),
                user_id: event.user_id.clone(),
                amount: event.amount,
                timestamp: event.timestamp,
                status: BID_STATUS_ACCEPTED.to_string(),
            });
        Ok(())
    }

    async fn bid_history(&self, item_id: &str, limit: i64) -> Result<Vec<Bid>> {
        self.check_failure()?;

        let bids = self.bids.lock().unwrap_or_else(|e| e.into_inner());
        let mut history: Vec<Bid> = bids
            .values()
            .filter(|bid| bid.item_id == item_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit as usize);
        Ok(history)
    }
}
