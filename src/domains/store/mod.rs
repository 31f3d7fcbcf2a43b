//! Shared bid store: atomic per-item `{highest_amount, highest_bidder}`
//! with compare-and-set semantics.
//!
//! Two interchangeable Redis strategies satisfy the same contract; both
//! return [`BidOutcome`], so callers stay strategy-agnostic. The strategy
//! is chosen at startup and never changes per request.

mod memory;
mod redis;

pub use self::memory::MemoryBidStore;
pub use self::redis::RedisBidStore;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome of a compare-and-set bid attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BidOutcome {
    /// The bid beat the current highest amount; both keys were updated
    /// atomically. `previous_amount` is the value observed at the instant
    /// of the swap (zero for the first bid on an item).
    Accepted {
        previous_amount: Decimal,
        new_amount: Decimal,
    },
    /// The bid did not beat the current highest amount. The store is
    /// unchanged.
    Rejected { current_amount: Decimal },
}

/// Store-level failures. Contention exhaustion in the optimistic strategy
/// surfaces as `Unavailable`: the request had no side effects and is safe
/// to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bid store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Atomic bid operations against the shared store.
///
/// `place_bid` is linearizable with respect to all other `place_bid`
/// calls on the same item: concurrent callers observe a total order in
/// which accepted amounts strictly increase, and exactly one caller sees
/// `Accepted` for any given previous amount.
#[async_trait]
pub trait BidStore: Send + Sync {
    async fn place_bid(
        &self,
        item_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BidOutcome, StoreError>;

    /// Read both keys; missing keys yield `(0, "")`.
    async fn read_bid(&self, item_id: &str) -> Result<(Decimal, String), StoreError>;
}

/// Contention strategy for [`RedisBidStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Server-side Lua script; compare and both writes happen inside the
    /// script's single-threaded execution slot. Cannot fail from
    /// contention.
    AtomicScript,
    /// WATCH/MULTI/EXEC with bounded retries. Each successful write
    /// strictly advances the value, so at most one conflict per
    /// concurrent accepter; retries converge quickly.
    Optimistic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::AtomicScript => write!(f, "atomic-script"),
            Strategy::Optimistic => write!(f, "optimistic"),
        }
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "atomic-script" => Ok(Strategy::AtomicScript),
            "optimistic" => Ok(Strategy::Optimistic),
            other => anyhow::bail!("unknown strategy {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "atomic-script".parse::<Strategy>().unwrap(),
            Strategy::AtomicScript
        );
        assert_eq!(
            "optimistic".parse::<Strategy>().unwrap(),
            Strategy::Optimistic
        );
        assert!("lua".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_display_roundtrip() {
        for strategy in [Strategy::AtomicScript, Strategy::Optimistic] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }
}
