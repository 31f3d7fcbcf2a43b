//! HTTP surface of the API gateway: status codes and response bodies for
//! the bid placement and item read endpoints.

mod common;

use bidding_core::domains::store::BidStore;
use common::{wait_for, TestGateway};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn test_first_bid_returns_201_and_updates_store() {
    let gateway = TestGateway::new();

    let (status, body) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 10.00}))
        .await;

    assert_eq!(status, 201);
    assert_eq!(body["success"], true);
    assert_eq!(body["is_highest"], true);
    assert_eq!(body["current_bid"], 10.0);
    assert_eq!(body["your_bid"], 10.0);
    assert!(body["event_id"].is_string());

    let (amount, bidder) = gateway.store.read_bid("item-1").await.unwrap();
    assert_eq!(amount, dec!(10.00));
    assert_eq!(bidder, "u1");
}

#[tokio::test]
async fn test_equal_bid_returns_200_with_current_bid() {
    let gateway = TestGateway::new();
    gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 10.00}))
        .await;

    let (status, body) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u2", "amount": 10.00}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["is_highest"], false);
    assert_eq!(body["current_bid"], 10.0);
    assert_eq!(body["your_bid"], 10.0);

    // Store unchanged
    let (amount, bidder) = gateway.store.read_bid("item-1").await.unwrap();
    assert_eq!(amount, dec!(10.00));
    assert_eq!(bidder, "u1");
}

#[tokio::test]
async fn test_one_cent_higher_bid_wins() {
    let gateway = TestGateway::new();
    gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 10.00}))
        .await;

    let (status, body) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u2", "amount": 10.01}))
        .await;

    assert_eq!(status, 201);
    assert_eq!(body["success"], true);

    let (amount, bidder) = gateway.store.read_bid("item-1").await.unwrap();
    assert_eq!(amount, dec!(10.01));
    assert_eq!(bidder, "u2");
}

#[tokio::test]
async fn test_validation_failures_return_400() {
    let gateway = TestGateway::new();

    let (status, body) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "", "amount": 10.00}))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let (status, _) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 0}))
        .await;
    assert_eq!(status, 400);

    let (status, _) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": -3.5}))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_store_outage_returns_500() {
    let gateway = TestGateway::new();
    gateway.store.set_unavailable(true);

    let (status, body) = gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 10.00}))
        .await;

    assert_eq!(status, 500);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_get_item_empty_and_after_bid() {
    let gateway = TestGateway::new();

    let (status, body) = gateway.get("/api/v1/items/item-1").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "item-1");
    assert_eq!(body["current_bid"], 0.0);
    assert!(body.get("highest_bidder_id").is_none());
    assert_eq!(body["status"], "active");

    gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 25.00}))
        .await;

    let (_, body) = gateway.get("/api/v1/items/item-1").await;
    assert_eq!(body["current_bid"], 25.0);
    assert_eq!(body["highest_bidder_id"], "u1");
}

#[tokio::test]
async fn test_accepted_bid_publishes_on_both_channels() {
    let gateway = TestGateway::new();

    gateway
        .post_json("/api/v1/items/item-1/bid", json!({"user_id": "u1", "amount": 10.00}))
        .await;

    let publisher = gateway.publisher.clone();
    wait_for(move || {
        publisher.live_count_for("item-1") == 1 && publisher.archive_events().len() == 1
    })
    .await;
}

#[tokio::test]
async fn test_health() {
    let gateway = TestGateway::new();
    let (status, body) = gateway.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}
