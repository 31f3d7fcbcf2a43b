//! Application setup and router assembly.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domains::bidding::BiddingService;
use crate::domains::broadcast::Registry;
use crate::server::routes::{
    broadcast_health, gateway_health, get_item, item_stats, place_bid, ws_upgrade,
};

/// Shared state of the API gateway
#[derive(Clone)]
pub struct GatewayState {
    pub bidding: Arc<BiddingService>,
}

/// Shared state of the broadcast service
#[derive(Clone)]
pub struct BroadcastState {
    pub registry: Arc<Registry>,
}

/// Build the API gateway router
pub fn build_gateway_app(bidding: Arc<BiddingService>) -> Router {
    Router::new()
        .route("/api/v1/items/:id", get(get_item))
        .route("/api/v1/items/:id/bid", post(place_bid))
        .route("/health", get(gateway_health))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(GatewayState { bidding })
}

/// Build the broadcast service router
pub fn build_broadcast_app(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/ws/items/:id", get(ws_upgrade))
        .route("/stats/items/:id", get(item_stats))
        .route("/health", get(broadcast_health))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(BroadcastState { registry })
}

/// The API sits behind a trusted gateway in production; origins are left
/// open here.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
