//! Item read and bid placement endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::common::models::BidRequest;
use crate::domains::bidding::BidError;
use crate::server::app::GatewayState;

/// GET /api/v1/items/:id
///
/// Current bid view of an item, straight from the bid store. Unknown
/// items read as zero-bid items; they materialize on first accepted bid.
pub async fn get_item(
    State(state): State<GatewayState>,
    Path(item_id): Path<String>,
) -> Response {
    match state.bidding.item(&item_id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => {
            error!(item_id = %item_id, error = %e, "failed to read item");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve item")
        }
    }
}

/// POST /api/v1/items/:id/bid
///
/// 201 with the bid response on acceptance, 200 with `success=false` on
/// a too-low bid, 400 on validation failure, 500 when the store is
/// unreachable (safe to retry: no side effects occurred).
pub async fn place_bid(
    State(state): State<GatewayState>,
    Path(item_id): Path<String>,
    Json(request): Json<BidRequest>,
) -> Response {
    match state.bidding.place_bid(&item_id, &request).await {
        Ok(response) => {
            let status = if response.success {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(response)).into_response()
        }
        Err(BidError::Invalid(reason)) => error_response(StatusCode::BAD_REQUEST, &reason),
        Err(BidError::Store(e)) => {
            error!(item_id = %item_id, error = %e, "bid store unavailable");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to place bid")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
