//! Redis-backed bid store.
//!
//! Both keys for an item are written together or not at all. The
//! atomic-script strategy runs the compare and both writes inside a Lua
//! script; the optimistic strategy uses WATCH/MULTI/EXEC with bounded
//! retries. Amounts are stored in the canonical two-decimal string
//! encoding regardless of strategy.

use anyhow::anyhow;
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::Script;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::warn;

use super::{BidOutcome, BidStore, StoreError, Strategy};
use crate::common::money::{format_amount, parse_amount};
use crate::common::subjects::{bid_key, bidder_key};

/// Retry budget for the optimistic strategy. Each accepted write strictly
/// advances the stored amount, so contention produces at most one conflict
/// per concurrent accepter and this bound is generous.
const MAX_OPTIMISTIC_RETRIES: u32 = 10;

/// Base of the linear backoff between optimistic retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Compare-and-set as a server-side script: read the current amount,
/// compare, write amount and bidder inside the script's execution slot.
/// Returns `(success_flag, previous_amount)`.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
local current_num = 0
if current then
    current_num = tonumber(current)
else
    current = '0.00'
end
if tonumber(ARGV[1]) > current_num then
    redis.call('SET', KEYS[1], ARGV[1])
    redis.call('SET', KEYS[2], ARGV[2])
    return {1, current}
end
return {0, current}
"#;

pub struct RedisBidStore {
    pool: Pool,
    strategy: Strategy,
    cas_script: Script,
}

impl RedisBidStore {
    pub fn new(pool: Pool, strategy: Strategy) -> Self {
        Self {
            pool,
            strategy,
            cas_script: Script::new(CAS_SCRIPT),
        }
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.into()))
    }

    async fn place_bid_script(
        &self,
        item_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BidOutcome, StoreError> {
        let mut conn = self.connection().await?;

        let (accepted, previous_raw): (i64, String) = self
            .cas_script
            .key(bid_key(item_id))
            .key(bidder_key(item_id))
            .arg(format_amount(amount))
            .arg(user_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.into()))?;

        let previous = parse_stored_amount(item_id, &previous_raw);
        if accepted == 1 {
            Ok(BidOutcome::Accepted {
                previous_amount: previous,
                new_amount: amount,
            })
        } else {
            Ok(BidOutcome::Rejected {
                current_amount: previous,
            })
        }
    }

    async fn place_bid_optimistic(
        &self,
        item_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BidOutcome, StoreError> {
        let bid_key = bid_key(item_id);
        let bidder_key = bidder_key(item_id);

        for attempt in 0..MAX_OPTIMISTIC_RETRIES {
            let mut conn = self.connection().await?;

            let _: () = redis::cmd("WATCH")
                .arg(&bid_key)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.into()))?;

            let current_raw: Option<String> = redis::cmd("GET")
                .arg(&bid_key)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.into()))?;
            let current = current_raw
                .as_deref()
                .map(|raw| parse_stored_amount(item_id, raw))
                .unwrap_or(Decimal::ZERO);

            if amount <= current {
                // Leave the connection clean before it returns to the pool
                let _: () = redis::cmd("UNWATCH")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.into()))?;
                return Ok(BidOutcome::Rejected {
                    current_amount: current,
                });
            }

            // EXEC returns nil when the watched key changed underneath us
            let committed: Option<()> = redis::pipe()
                .atomic()
                .set(&bid_key, format_amount(amount))
                .ignore()
                .set(&bidder_key, user_id)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.into()))?;

            match committed {
                Some(()) => {
                    return Ok(BidOutcome::Accepted {
                        previous_amount: current,
                        new_amount: amount,
                    })
                }
                None => {
                    tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
                }
            }
        }

        Err(StoreError::Unavailable(anyhow!(
            "optimistic transaction conflicted {MAX_OPTIMISTIC_RETRIES} times for item {item_id}"
        )))
    }
}

#[async_trait]
impl BidStore for RedisBidStore {
    async fn place_bid(
        &self,
        item_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BidOutcome, StoreError> {
        match self.strategy {
            Strategy::AtomicScript => self.place_bid_script(item_id, user_id, amount).await,
            Strategy::Optimistic => self.place_bid_optimistic(item_id, user_id, amount).await,
        }
    }

    async fn read_bid(&self, item_id: &str) -> Result<(Decimal, String), StoreError> {
        let mut conn = self.connection().await?;

        let (amount_raw, bidder): (Option<String>, Option<String>) = redis::pipe()
            .get(bid_key(item_id))
            .get(bidder_key(item_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.into()))?;

        let amount = amount_raw
            .as_deref()
            .map(|raw| parse_stored_amount(item_id, raw))
            .unwrap_or(Decimal::ZERO);
        Ok((amount, bidder.unwrap_or_default()))
    }
}

/// Parse an amount read back from Redis. An unparseable value means the
/// key was written outside this service; treat it as no bid rather than
/// failing the read path.
fn parse_stored_amount(item_id: &str, raw: &str) -> Decimal {
    match parse_amount(raw) {
        Some(amount) => amount,
        None => {
            warn!(item_id = %item_id, raw = %raw, "unparseable amount in bid store");
            Decimal::ZERO
        }
    }
}
