//! NATS event publishing for production and testing.
//!
//! Accepted bids travel two channels: a transient core-NATS subject for
//! real-time fan-out and a durable JetStream subject for archival. The
//! `EventPublisher` trait allows swapping the real connection for a
//! recording test double.

use anyhow::{Context as _, Result};
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::common::subjects::{archive_subject, live_subject, ARCHIVE_WILDCARD, STREAM_NAME};

/// Deadline for the durable publish: the broker must acknowledge
/// persistence within this window or the publish counts as failed.
const ARCHIVE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retention window of the durable stream.
const STREAM_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A published bid event, as recorded by [`TestPublisher`].
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub item_id: String,
    pub payload: Bytes,
}

/// Trait for the two publish channels of an accepted bid.
///
/// Both calls are invoked post-acceptance from detached tasks; failures
/// are an observability concern for the caller, never a correctness one.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Best-effort transient publish on `bid.live.{item_id}`.
    async fn publish_live(&self, item_id: &str, payload: Bytes) -> Result<()>;

    /// Durable publish on `bid.archive.{item_id}`. Resolves once the
    /// broker acknowledges persistence, within [`ARCHIVE_ACK_TIMEOUT`].
    async fn publish_archive(&self, item_id: &str, payload: Bytes) -> Result<()>;
}

/// Real NATS publisher: core client for the transient channel, JetStream
/// context for the durable one.
pub struct NatsEventPublisher {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsEventPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self { client, jetstream }
    }

    /// Create or update the durable stream this publisher writes to.
    /// Called once at gateway startup.
    pub async fn ensure_stream(&self) -> Result<()> {
        ensure_stream(&self.jetstream).await
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish_live(&self, item_id: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish(live_subject(item_id), payload)
            .await
            .context("transient publish failed")?;
        Ok(())
    }

    async fn publish_archive(&self, item_id: &str, payload: Bytes) -> Result<()> {
        let publish = async {
            let ack = self
                .jetstream
                .publish(archive_subject(item_id), payload)
                .await
                .context("durable publish failed")?;
            ack.await.context("broker did not acknowledge publish")?;
            Ok::<_, anyhow::Error>(())
        };

        tokio::time::timeout(ARCHIVE_ACK_TIMEOUT, publish)
            .await
            .context("durable publish timed out")??;
        Ok(())
    }
}

/// Create or update the `BID_EVENTS` stream bound to `bid.archive.*`.
///
/// Work-queue retention: each archived event is consumed by exactly one
/// acking consumer. File storage with a bounded retention window.
pub async fn ensure_stream(jetstream: &jetstream::Context) -> Result<()> {
    jetstream
        .get_or_create_stream(jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            description: Some("Accepted bid events awaiting archival".to_string()),
            subjects: vec![ARCHIVE_WILDCARD.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            max_age: STREAM_MAX_AGE,
            num_replicas: 1,
            ..Default::default()
        })
        .await
        .with_context(|| format!("failed to create/update stream {STREAM_NAME}"))?;

    tracing::info!(stream = STREAM_NAME, "durable stream ready");
    Ok(())
}

/// Recording publisher for tests.
///
/// Tracks every publish per channel without requiring a broker, and can
/// simulate durable-publish failures to exercise the at-least-once path.
#[derive(Default)]
pub struct TestPublisher {
    live: RwLock<Vec<PublishedEvent>>,
    archive: RwLock<Vec<PublishedEvent>>,
    fail_archive_times: AtomicUsize,
}

impl TestPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` durable publishes fail.
    pub fn fail_next_archive_publishes(&self, n: usize) {
        self.fail_archive_times.store(n, Ordering::SeqCst);
    }

    pub fn live_events(&self) -> Vec<PublishedEvent> {
        self.live.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn archive_events(&self) -> Vec<PublishedEvent> {
        self.archive
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn live_count_for(&self, item_id: &str) -> usize {
        self.live
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.item_id == item_id)
            .count()
    }

    /// Deserialize a recorded payload as JSON.
    pub fn deserialize<T: serde::de::DeserializeOwned>(
        event: &PublishedEvent,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&event.payload)
    }
}

#[async_trait]
impl EventPublisher for TestPublisher {
    async fn publish_live(&self, item_id: &str, payload: Bytes) -> Result<()> {
        self.live
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedEvent {
                item_id: item_id.to_string(),
                payload,
            });
        Ok(())
    }

    async fn publish_archive(&self, item_id: &str, payload: Bytes) -> Result<()> {
        let remaining = self.fail_archive_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_archive_times.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated durable publish failure");
        }

        self.archive
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedEvent {
                item_id: item_id.to_string(),
                payload,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_per_channel() {
        let publisher = TestPublisher::new();

        publisher
            .publish_live("item-1", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        publisher
            .publish_archive("item-1", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        publisher
            .publish_live("item-2", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(publisher.live_events().len(), 2);
        assert_eq!(publisher.archive_events().len(), 1);
        assert_eq!(publisher.live_count_for("item-1"), 1);
    }

    #[tokio::test]
    async fn test_simulated_archive_failure() {
        let publisher = TestPublisher::new();
        publisher.fail_next_archive_publishes(1);

        let first = publisher
            .publish_archive("item-1", Bytes::from_static(b"{}"))
            .await;
        assert!(first.is_err());

        let second = publisher
            .publish_archive("item-1", Bytes::from_static(b"{}"))
            .await;
        assert!(second.is_ok());
        assert_eq!(publisher.archive_events().len(), 1);
    }
}
