//! NATS ingress for the broadcast service.
//!
//! One wildcard subscription covers every item; each message is routed
//! to the matching subscriber set. The payload is forwarded verbatim, so
//! spectators see exactly what the gateway published.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::common::models::BidEvent;
use crate::common::subjects::{item_id_from_live_subject, LIVE_WILDCARD};
use crate::domains::broadcast::Registry;

/// Subscribe to the live fan-out subjects and dispatch until the
/// connection closes.
pub async fn run(client: async_nats::Client, registry: Arc<Registry>) -> Result<()> {
    let mut subscription = client
        .subscribe(LIVE_WILDCARD)
        .await
        .context("failed to subscribe to live bid events")?;
    info!(subject = LIVE_WILDCARD, "listening for live bid events");

    while let Some(message) = subscription.next().await {
        // The item id is the last subject token; fall back to the
        // payload for messages published on unexpected subjects
        let item_id = match item_id_from_live_subject(&message.subject) {
            Some(id) => id.to_string(),
            None => match serde_json::from_slice::<BidEvent>(&message.payload) {
                Ok(event) => event.item_id,
                Err(e) => {
                    warn!(subject = %message.subject, error = %e, "unroutable live event");
                    continue;
                }
            },
        };

        let report = registry.dispatch(&item_id, message.payload).await;
        debug!(
            item_id = %item_id,
            delivered = report.delivered,
            evicted = report.evicted,
            "live event dispatched"
        );
    }

    Ok(())
}
