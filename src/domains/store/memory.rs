//! In-memory bid store for tests.
//!
//! Honors the same contract as the Redis store: compare-and-set of both
//! fields under a single lock, monotonically increasing accepted amounts.
//! Can simulate transport failure to exercise the unavailable path.

use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{BidOutcome, BidStore, StoreError};

#[derive(Default)]
pub struct MemoryBidStore {
    items: Mutex<HashMap<String, (Decimal, String)>>,
    unavailable: AtomicBool,
}

impl MemoryBidStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed an item directly, bypassing the compare.
    pub fn seed(&self, item_id: &str, amount: Decimal, bidder: &str) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item_id.to_string(), (amount, bidder.to_string()));
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow!("simulated outage")));
        }
        Ok(())
    }
}

#[async_trait]
impl BidStore for MemoryBidStore {
    async fn place_bid(
        &self,
        item_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BidOutcome, StoreError> {
        self.check_available()?;

        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let entry = items
            .entry(item_id.to_string())
            .or_insert((Decimal::ZERO, String::new()));

        if amount > entry.0 {
            let previous = entry.0;
            *entry = (amount, user_id.to_string());
            Ok(BidOutcome::Accepted {
                previous_amount: previous,
                new_amount: amount,
            })
        } else {
            Ok(BidOutcome::Rejected {
                current_amount: entry.0,
            })
        }
    }

    async fn read_bid(&self, item_id: &str) -> Result<(Decimal, String), StoreError> {
        self.check_available()?;

        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items
            .get(item_id)
            .cloned()
            .unwrap_or((Decimal::ZERO, String::new())))
    }
}
