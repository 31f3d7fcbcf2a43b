//! Wire and storage types shared by the gateway, broadcast, and archival
//! services.
//!
//! Money amounts are `rust_decimal::Decimal` in memory and JSON numbers on
//! the wire. The canonical two-decimal string encoding used by the bid store
//! lives in [`crate::common::money`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status recorded on every archived bid row. Only accepted bids are
/// published, so only accepted bids are archived.
pub const BID_STATUS_ACCEPTED: &str = "accepted";

/// Item status exposed by the gateway read path.
pub const ITEM_STATUS_ACTIVE: &str = "active";

/// A single bid on an item, as persisted in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub item_id: String,
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

/// Incoming bid request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// API response after placing a bid.
///
/// Returned both on acceptance (`success = true`, HTTP 201) and on a
/// too-low bid (`success = false`, HTTP 200, current bid disclosed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidResponse {
    pub success: bool,
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub your_bid: Decimal,
    pub is_highest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

/// Event emitted for every accepted bid.
///
/// The same payload travels both channels: `bid.live.{item_id}` for
/// real-time fan-out and `bid.archive.{item_id}` for durable archival.
/// `previous_bid` is the highest amount observed at the instant of the
/// compare-and-set (zero for the first bid on an item).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidEvent {
    pub event_id: Uuid,
    pub item_id: String,
    pub bid_id: Uuid,
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_bid: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Read-model view of an auction item served by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_bid: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_bidder_id: Option<String>,
    pub status: String,
}
