//! WebSocket upgrade and per-item stats for the broadcast service.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use std::sync::Arc;

use crate::domains::broadcast::session::serve_connection;
use crate::server::app::BroadcastState;

/// GET /ws/items/:id
///
/// Upgrades to a WebSocket and streams every accepted bid on the item
/// from the moment of connection. The first frame is the welcome frame;
/// there is no replay of earlier events.
pub async fn ws_upgrade(
    State(state): State<BroadcastState>,
    Path(item_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| serve_connection(socket, registry, item_id))
}

#[derive(serde::Serialize)]
pub struct ItemStats {
    #[serde(rename = "itemId")]
    pub item_id: String,
    pub subscribers: usize,
}

/// GET /stats/items/:id
pub async fn item_stats(
    State(state): State<BroadcastState>,
    Path(item_id): Path<String>,
) -> Json<ItemStats> {
    let subscribers = state.registry.subscriber_count(&item_id);
    Json(ItemStats {
        item_id,
        subscribers,
    })
}
