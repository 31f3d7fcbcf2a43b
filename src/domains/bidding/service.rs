//! Bid placement workflow.
//!
//! The compare-and-set outcome is the source of truth: the caller gets
//! success the moment the swap commits. Everything downstream (fan-out,
//! archival) runs in detached tasks and is eventual.

use bytes::Bytes;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::models::{BidEvent, BidRequest, BidResponse, Item, ITEM_STATUS_ACTIVE};
use crate::common::money::format_amount;
use crate::domains::bidding::PriceCache;
use crate::domains::store::{BidOutcome, BidStore, StoreError};
use crate::kernel::EventPublisher;

/// Failures surfaced to the HTTP layer.
#[derive(Debug, Error)]
pub enum BidError {
    /// Request failed local validation; the store was never called.
    #[error("invalid bid: {0}")]
    Invalid(String),

    /// The store could not serve the request. No side effects occurred;
    /// the request is safe to retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct BiddingService {
    store: Arc<dyn BidStore>,
    publisher: Arc<dyn EventPublisher>,
    cache: PriceCache,
}

impl BiddingService {
    pub fn new(store: Arc<dyn BidStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            publisher,
            cache: PriceCache::new(),
        }
    }

    /// Place a bid on an item.
    ///
    /// Returns a rejection response (not an error) when the bid does not
    /// beat the current highest amount; the current bid is disclosed.
    pub async fn place_bid(
        &self,
        item_id: &str,
        request: &BidRequest,
    ) -> Result<BidResponse, BidError> {
        if request.user_id.is_empty() {
            return Err(BidError::Invalid("user_id is required".to_string()));
        }
        if request.amount <= Decimal::ZERO {
            return Err(BidError::Invalid(
                "bid amount must be positive".to_string(),
            ));
        }

        // Amounts are fixed two-decimal money from here on
        let amount = request.amount.round_dp(2);

        if let Some(response) = self.pre_filter(item_id, amount).await {
            return Ok(response);
        }

        match self.store.place_bid(item_id, &request.user_id, amount).await? {
            BidOutcome::Rejected { current_amount } => {
                // Keep the cache fresh even on rejection
                self.cache.store(item_id, current_amount);
                Ok(rejected_response(current_amount, amount))
            }
            BidOutcome::Accepted {
                previous_amount, ..
            } => {
                self.cache.store(item_id, amount);

                let event = BidEvent {
                    event_id: Uuid::new_v4(),
                    item_id: item_id.to_string(),
                    bid_id: Uuid::new_v4(),
                    user_id: request.user_id.clone(),
                    amount,
                    previous_bid: previous_amount,
                    timestamp: Utc::now(),
                };
                info!(
                    item_id = %item_id,
                    user_id = %request.user_id,
                    amount = %amount,
                    previous = %previous_amount,
                    "bid accepted"
                );

                let event_id = event.event_id;
                self.dispatch(event);

                Ok(BidResponse {
                    success: true,
                    message: "Bid placed successfully".to_string(),
                    current_bid: amount,
                    your_bid: amount,
                    is_highest: true,
                    event_id: Some(event_id),
                })
            }
        }
    }

    /// Current bid view of an item, straight from the store.
    pub async fn item(&self, item_id: &str) -> Result<Item, StoreError> {
        let (current_bid, bidder) = self.store.read_bid(item_id).await?;
        Ok(Item {
            id: item_id.to_string(),
            current_bid,
            highest_bidder_id: (!bidder.is_empty()).then_some(bidder),
            status: ITEM_STATUS_ACTIVE.to_string(),
        })
    }

    /// Load-shedding pre-filter: reject obviously-too-low bids without the
    /// compare-and-set, but only after confirming against authoritative
    /// state. Never accepts; only `place_bid` may.
    async fn pre_filter(&self, item_id: &str, amount: Decimal) -> Option<BidResponse> {
        let cached = self.cache.get(item_id)?;
        if amount > cached {
            return None;
        }

        let authoritative = match self.store.read_bid(item_id).await {
            Ok((actual, _)) => {
                if actual != cached {
                    debug!(
                        item_id = %item_id,
                        cached = %cached,
                        actual = %actual,
                        "stale price cache re-synced"
                    );
                    self.cache.store(item_id, actual);
                }
                actual
            }
            Err(e) => {
                // Confirmation unavailable; the cached value is the best
                // information we have
                warn!(item_id = %item_id, error = %e, "confirmatory read failed");
                cached
            }
        };

        if amount <= authoritative {
            debug!(item_id = %item_id, amount = %amount, current = %authoritative, "pre-filter rejection");
            return Some(rejected_response(authoritative, amount));
        }
        None
    }

    /// Fire-and-forget dispatch of an accepted bid on both channels.
    /// Neither publish blocks the response; failures are logged only.
    fn dispatch(&self, event: BidEvent) {
        let payload = match serde_json::to_vec(&event) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "failed to serialize bid event");
                return;
            }
        };

        let live_publisher = Arc::clone(&self.publisher);
        let live_payload = payload.clone();
        let live_item = event.item_id.clone();
        tokio::spawn(async move {
            if let Err(e) = live_publisher.publish_live(&live_item, live_payload).await {
                warn!(item_id = %live_item, error = %e, "transient publish failed");
            }
        });

        let archive_publisher = Arc::clone(&self.publisher);
        let archive_item = event.item_id.clone();
        let event_id = event.event_id;
        tokio::spawn(async move {
            if let Err(e) = archive_publisher
                .publish_archive(&archive_item, payload)
                .await
            {
                // The bid itself is safe; the audit trail now has a gap
                // until the event is reconstructed, so alerting keys off
                // this line.
                error!(
                    item_id = %archive_item,
                    event_id = %event_id,
                    error = %e,
                    "durable publish failed"
                );
            }
        });
    }
}

fn rejected_response(current_bid: Decimal, your_bid: Decimal) -> BidResponse {
    BidResponse {
        success: false,
        message: format!(
            "Bid too low. Current highest bid is {}",
            format_amount(current_bid)
        ),
        current_bid,
        your_bid,
        is_highest: false,
        event_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::store::MemoryBidStore;
    use crate::kernel::TestPublisher;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store wrapper that counts calls, for asserting what the pre-filter
    /// actually sends to the store.
    struct CountingStore {
        inner: MemoryBidStore,
        place_calls: AtomicUsize,
        read_calls: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryBidStore::new(),
                place_calls: AtomicUsize::new(0),
                read_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BidStore for CountingStore {
        async fn place_bid(
            &self,
            item_id: &str,
            user_id: &str,
            amount: Decimal,
        ) -> Result<BidOutcome, StoreError> {
            self.place_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.place_bid(item_id, user_id, amount).await
        }

        async fn read_bid(&self, item_id: &str) -> Result<(Decimal, String), StoreError> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.read_bid(item_id).await
        }
    }

    fn service_with(
        store: Arc<dyn BidStore>,
    ) -> (BiddingService, Arc<TestPublisher>) {
        let publisher = Arc::new(TestPublisher::new());
        let service = BiddingService::new(store, publisher.clone());
        (service, publisher)
    }

    fn bid(user_id: &str, amount: Decimal) -> BidRequest {
        BidRequest {
            user_id: user_id.to_string(),
            amount,
        }
    }

    /// Wait for the detached publish tasks to finish.
    async fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !condition() {
            if tokio::time::Instant::now() > deadline {
                panic!("condition not reached within deadline");
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_first_bid_accepted_and_published() {
        let (service, publisher) = service_with(Arc::new(MemoryBidStore::new()));

        let response = service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();

        assert!(response.success);
        assert!(response.is_highest);
        assert_eq!(response.current_bid, dec!(10.00));
        assert!(response.event_id.is_some());

        wait_for(|| publisher.archive_events().len() == 1).await;
        wait_for(|| publisher.live_events().len() == 1).await;

        let event: BidEvent =
            TestPublisher::deserialize(&publisher.archive_events()[0]).unwrap();
        assert_eq!(event.item_id, "item-1");
        assert_eq!(event.amount, dec!(10.00));
        assert_eq!(event.previous_bid, Decimal::ZERO);
        assert_eq!(event.event_id, response.event_id.unwrap());
    }

    #[tokio::test]
    async fn test_equal_bid_rejected_with_current_disclosed() {
        let (service, publisher) = service_with(Arc::new(MemoryBidStore::new()));

        service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();
        let response = service
            .place_bid("item-1", &bid("u2", dec!(10.00)))
            .await
            .unwrap();

        assert!(!response.success);
        assert!(!response.is_highest);
        assert_eq!(response.current_bid, dec!(10.00));
        assert_eq!(response.your_bid, dec!(10.00));
        assert!(response.event_id.is_none());

        // Only the accepted bid was published
        wait_for(|| publisher.live_events().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(publisher.live_events().len(), 1);
    }

    #[tokio::test]
    async fn test_higher_bid_carries_previous() {
        let (service, publisher) = service_with(Arc::new(MemoryBidStore::new()));

        service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();
        service
            .place_bid("item-1", &bid("u2", dec!(10.01)))
            .await
            .unwrap();

        wait_for(|| publisher.archive_events().len() == 2).await;
        let second: BidEvent =
            TestPublisher::deserialize(&publisher.archive_events()[1]).unwrap();
        assert_eq!(second.amount, dec!(10.01));
        assert_eq!(second.previous_bid, dec!(10.00));
        assert_eq!(second.user_id, "u2");
    }

    #[tokio::test]
    async fn test_validation_rejects_locally() {
        let store = Arc::new(CountingStore::new());
        let (service, _) = service_with(store.clone());

        assert!(matches!(
            service.place_bid("item-1", &bid("", dec!(10.00))).await,
            Err(BidError::Invalid(_))
        ));
        assert!(matches!(
            service.place_bid("item-1", &bid("u1", dec!(0))).await,
            Err(BidError::Invalid(_))
        ));
        assert!(matches!(
            service.place_bid("item-1", &bid("u1", dec!(-5))).await,
            Err(BidError::Invalid(_))
        ));

        assert_eq!(store.place_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.read_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pre_filter_sheds_load_after_confirmation() {
        let store = Arc::new(CountingStore::new());
        let (service, _) = service_with(store.clone());

        service
            .place_bid("item-1", &bid("u1", dec!(20.00)))
            .await
            .unwrap();
        assert_eq!(store.place_calls.load(Ordering::SeqCst), 1);

        // Cache now holds 20.00; a lower bid is rejected on the
        // confirmatory read alone
        let response = service
            .place_bid("item-1", &bid("u2", dec!(15.00)))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.current_bid, dec!(20.00));
        assert_eq!(store.place_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.read_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_never_rejects_valid_bid() {
        let store = Arc::new(CountingStore::new());
        let (service, _) = service_with(store.clone());

        service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();

        // The store moves underneath the cache
        store.inner.seed("item-1", dec!(5.00), "elsewhere");

        // Cache says 10.00, store says 5.00: the bid of 7.00 hits the
        // pre-filter, the confirmatory read reveals the truth, and the
        // bid proceeds to the store
        let response = service
            .place_bid("item-1", &bid("u2", dec!(7.00)))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(store.place_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejection_refreshes_cache() {
        let store = Arc::new(CountingStore::new());
        let (service, _) = service_with(store.clone());

        service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();
        store.inner.seed("item-1", dec!(50.00), "elsewhere");

        // 30.00 beats the cached 10.00 so it goes to the store and loses;
        // the rejection updates the cache to 50.00
        let response = service
            .place_bid("item-1", &bid("u2", dec!(30.00)))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.current_bid, dec!(50.00));

        // The next low bid is now shed by the pre-filter
        let before = store.place_calls.load(Ordering::SeqCst);
        service
            .place_bid("item-1", &bid("u3", dec!(40.00)))
            .await
            .unwrap();
        assert_eq!(store.place_calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_unavailable() {
        let store = Arc::new(MemoryBidStore::new());
        store.set_unavailable(true);
        let (service, _) = service_with(store);

        assert!(matches!(
            service.place_bid("item-1", &bid("u1", dec!(10.00))).await,
            Err(BidError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_durable_publish_failure_does_not_fail_the_bid() {
        let (service, publisher) = service_with(Arc::new(MemoryBidStore::new()));
        publisher.fail_next_archive_publishes(1);

        let response = service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();
        assert!(response.success);

        // The transient channel still delivered
        wait_for(|| publisher.live_count_for("item-1") == 1).await;
        assert!(publisher.archive_events().is_empty());
    }

    #[tokio::test]
    async fn test_item_view() {
        let (service, _) = service_with(Arc::new(MemoryBidStore::new()));

        let empty = service.item("item-1").await.unwrap();
        assert_eq!(empty.current_bid, Decimal::ZERO);
        assert_eq!(empty.highest_bidder_id, None);

        service
            .place_bid("item-1", &bid("u1", dec!(10.00)))
            .await
            .unwrap();
        let item = service.item("item-1").await.unwrap();
        assert_eq!(item.current_bid, dec!(10.00));
        assert_eq!(item.highest_bidder_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_amount_rounded_to_two_decimals() {
        let (service, _) = service_with(Arc::new(MemoryBidStore::new()));

        let response = service
            .place_bid("item-1", &bid("u1", dec!(10.005)))
            .await
            .unwrap();
        assert_eq!(response.current_bid, dec!(10.01));
    }
}
