//! Bid decision core: validation, pre-filter cache, compare-and-set,
//! event dispatch.

pub mod cache;
pub mod service;

pub use cache::PriceCache;
pub use service::{BidError, BiddingService};
