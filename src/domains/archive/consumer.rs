//! Durable-stream consumer feeding the relational archive.
//!
//! Delivery is at-least-once and unordered; correctness rests entirely
//! on the archive's idempotent insert and conditional update. Poison
//! messages and transient database errors are NAKed with a delay and
//! redelivered until the broker's `max_deliver` gives up on them.

use anyhow::{Context, Result};
use async_nats::jetstream::consumer::{pull, AckPolicy};
use async_nats::jetstream::{self, AckKind};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::common::models::BidEvent;
use crate::common::subjects::{ARCHIVE_WILDCARD, STREAM_NAME};
use crate::domains::archive::BidArchive;
use crate::kernel::ensure_stream;

/// Durable consumer name; survives worker restarts.
pub const CONSUMER_NAME: &str = "archival-worker";

/// Unacked messages are redelivered after this long.
const ACK_WAIT: Duration = Duration::from_secs(30);

/// Delivery attempts before the broker drops or dead-letters a message.
const MAX_DELIVER: i64 = 5;

/// Redelivery delay requested on NAK.
const NAK_DELAY: Duration = Duration::from_secs(5);

/// Consume the durable stream until shutdown is signalled or the stream
/// ends. The in-flight message always finishes before the loop exits.
pub async fn run_consumer(
    client: async_nats::Client,
    archive: Arc<dyn BidArchive>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let jetstream = jetstream::new(client);
    // The gateway normally creates the stream; creating it here too
    // makes worker startup order irrelevant
    ensure_stream(&jetstream).await?;

    let stream = jetstream
        .get_stream(STREAM_NAME)
        .await
        .context("failed to open durable stream")?;
    let consumer = stream
        .get_or_create_consumer(
            CONSUMER_NAME,
            pull::Config {
                durable_name: Some(CONSUMER_NAME.to_string()),
                filter_subject: ARCHIVE_WILDCARD.to_string(),
                ack_policy: AckPolicy::Explicit,
                ack_wait: ACK_WAIT,
                max_deliver: MAX_DELIVER,
                ..Default::default()
            },
        )
        .await
        .context("failed to create durable consumer")?;
    info!(consumer = CONSUMER_NAME, stream = STREAM_NAME, "consuming bid events");

    let mut messages = consumer
        .messages()
        .await
        .context("failed to open message iterator")?;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("shutdown requested, stopping consumer");
                return Ok(());
            }
            maybe_message = messages.next() => match maybe_message {
                None => {
                    warn!("message iterator ended");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "failed to pull message");
                }
                Some(Ok(message)) => {
                    handle_message(archive.as_ref(), message).await;
                }
            }
        }
    }
}

/// Process one message end to end: decode, persist, ack or nak.
async fn handle_message(archive: &dyn BidArchive, message: jetstream::Message) {
    let event = match decode_event(&message.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(subject = %message.subject, error = %e, "undecodable bid event");
            nak(&message).await;
            return;
        }
    };

    match persist_event(archive, &event).await {
        Ok(advanced) => {
            info!(
                event_id = %event.event_id,
                item_id = %event.item_id,
                amount = %event.amount,
                advanced = advanced,
                "bid event archived"
            );
            if let Err(e) = message.ack().await {
                warn!(event_id = %event.event_id, error = %e, "failed to ack message");
            }
        }
        Err(e) => {
            error!(event_id = %event.event_id, error = %e, "failed to persist bid event");
            nak(&message).await;
        }
    }
}

async fn nak(message: &jetstream::Message) {
    if let Err(e) = message.ack_with(AckKind::Nak(Some(NAK_DELAY))).await {
        warn!(error = %e, "failed to nak message");
    }
}

fn decode_event(payload: &[u8]) -> Result<BidEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Persist one event. The item view goes first so the audit row's
/// foreign key always has a parent; both operations are replay-safe, so
/// a failure between them only costs a redelivery.
pub async fn persist_event(archive: &dyn BidArchive, event: &BidEvent) -> Result<bool> {
    let advanced = archive.update_item(event).await?;
    archive.insert_bid(event).await?;
    Ok(advanced)
}
