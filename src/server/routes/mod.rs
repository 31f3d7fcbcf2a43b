// HTTP routes
pub mod health;
pub mod items;
pub mod ws;

pub use health::{broadcast_health, gateway_health};
pub use items::{get_item, place_bid};
pub use ws::{item_stats, ws_upgrade};
