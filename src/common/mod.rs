// Common types and utilities shared across the three services

pub mod models;
pub mod money;
pub mod subjects;

pub use models::{
    Bid, BidEvent, BidRequest, BidResponse, Item, BID_STATUS_ACCEPTED, ITEM_STATUS_ACTIVE,
};
pub use money::{format_amount, parse_amount};
pub use subjects::{
    archive_subject, bid_key, bidder_key, item_id_from_live_subject, live_subject,
    ARCHIVE_WILDCARD, LIVE_WILDCARD, STREAM_NAME,
};
