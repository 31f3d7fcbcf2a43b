//! Test harness wiring the gateway router over in-memory dependencies.
//!
//! Each test gets a fresh store, publisher, and router; requests go
//! through the real Axum stack via `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bidding_core::domains::bidding::BiddingService;
use bidding_core::domains::store::MemoryBidStore;
use bidding_core::kernel::TestPublisher;
use bidding_core::server::build_gateway_app;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestGateway {
    pub app: Router,
    pub store: Arc<MemoryBidStore>,
    pub publisher: Arc<TestPublisher>,
    pub bidding: Arc<BiddingService>,
}

impl TestGateway {
    pub fn new() -> Self {
        let store = Arc::new(MemoryBidStore::new());
        let publisher = Arc::new(TestPublisher::new());
        let bidding = Arc::new(BiddingService::new(store.clone(), publisher.clone()));
        Self {
            app: build_gateway_app(bidding.clone()),
            store,
            publisher,
            bidding,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response was not JSON")
        };
        (status, json)
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll until the detached publish tasks catch up.
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within deadline");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
