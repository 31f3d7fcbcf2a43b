//! Process-local price cache for the bid pre-filter.
//!
//! The cache is untrusted: a hit only triggers a confirmatory read, never
//! a decision. Stale values self-heal on that read, so the worst a stale
//! entry costs is one extra round trip.

use dashmap::DashMap;
use rust_decimal::Decimal;

/// `item_id -> last known highest amount`, updated opportunistically after
/// every store call.
#[derive(Default)]
pub struct PriceCache {
    prices: DashMap<String, Decimal>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_id: &str) -> Option<Decimal> {
        self.prices.get(item_id).map(|entry| *entry)
    }

    pub fn store(&self, item_id: &str, amount: Decimal) {
        self.prices.insert(item_id.to_string(), amount);
    }
}
