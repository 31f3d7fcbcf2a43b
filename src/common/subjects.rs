//! NATS subject and Redis key layout.
//!
//! Two channels carry every accepted bid: a transient subject for the
//! broadcast service and a durable JetStream subject for the archiver.
//! Item ids are the final subject token, so a wildcard subscription covers
//! all items and the item id can be recovered without parsing the payload.

/// Durable stream holding archival copies of accepted bids.
pub const STREAM_NAME: &str = "BID_EVENTS";

/// Wildcard over all transient fan-out subjects.
pub const LIVE_WILDCARD: &str = "bid.live.*";

/// Wildcard over all archival subjects; the `BID_EVENTS` stream is bound
/// to this pattern.
pub const ARCHIVE_WILDCARD: &str = "bid.archive.*";

const LIVE_PREFIX: &str = "bid.live.";

/// Transient fan-out subject for one item.
pub fn live_subject(item_id: &str) -> String {
    format!("{LIVE_PREFIX}{item_id}")
}

/// Durable archival subject for one item.
pub fn archive_subject(item_id: &str) -> String {
    format!("bid.archive.{item_id}")
}

/// Recover the item id from a transient subject. Returns `None` when the
/// subject does not match the fan-out pattern; callers fall back to the
/// payload's `item_id` field.
pub fn item_id_from_live_subject(subject: &str) -> Option<&str> {
    subject
        .strip_prefix(LIVE_PREFIX)
        .filter(|rest| !rest.is_empty() && !rest.contains('.'))
}

/// Redis key holding the current highest bid amount for an item.
pub fn bid_key(item_id: &str) -> String {
    format!("item:{item_id}:current_bid")
}

/// Redis key holding the current highest bidder id for an item.
pub fn bidder_key(item_id: &str) -> String {
    format!("item:{item_id}:highest_bidder")
}
