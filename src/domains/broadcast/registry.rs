//! Per-item subscriber registry.
//!
//! Each subscriber owns a bounded outbound queue; dispatch enqueues
//! without blocking and evicts any subscriber whose queue is full. One
//! backpressured client therefore never delays delivery to the others
//! watching the same item.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Outbound queue capacity per subscriber.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Below this many subscribers a sequential enqueue loop beats the
/// overhead of sharding.
const SEQUENTIAL_DISPATCH_LIMIT: usize = 500;

/// Worker count for the sharded dispatch path.
const DISPATCH_WORKERS: usize = 10;

/// A registered spectator connection.
pub struct Subscription {
    pub client_id: Uuid,
    /// Sender half of the outbound queue; used once for the welcome
    /// frame, then dropped so eviction closes the queue.
    pub sender: mpsc::Sender<Bytes>,
    pub receiver: mpsc::Receiver<Bytes>,
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Default, PartialEq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// `item_id -> {client_id -> outbound queue}` with concurrent lookup,
/// insert, and removal. Dispatch iterates a snapshot, so a subscriber
/// removed mid-cycle may or may not see the in-flight payload.
#[derive(Default)]
pub struct Registry {
    items: DashMap<String, DashMap<Uuid, mpsc::Sender<Bytes>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber under an item.
    pub fn subscribe(&self, item_id: &str) -> Subscription {
        let client_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        self.items
            .entry(item_id.to_string())
            .or_default()
            .insert(client_id, sender.clone());

        debug!(item_id = %item_id, client_id = %client_id, "subscriber registered");
        Subscription {
            client_id,
            sender,
            receiver,
        }
    }

    /// Remove a subscriber. Dropping its queue sender ends the egress
    /// task, which closes the connection. Idempotent.
    pub fn unsubscribe(&self, item_id: &str, client_id: Uuid) {
        if let Some(subscribers) = self.items.get(item_id) {
            if subscribers.remove(&client_id).is_some() {
                debug!(item_id = %item_id, client_id = %client_id, "subscriber removed");
            }
        }
    }

    pub fn subscriber_count(&self, item_id: &str) -> usize {
        self.items
            .get(item_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Deliver a payload to every subscriber of an item.
    ///
    /// Non-blocking per subscriber: a full queue means the client is not
    /// keeping up, and it is evicted rather than awaited.
    pub async fn dispatch(&self, item_id: &str, payload: Bytes) -> DispatchReport {
        // Snapshot the senders so eviction never mutates the map under
        // the iterator
        let snapshot: Vec<(Uuid, mpsc::Sender<Bytes>)> = match self.items.get(item_id) {
            Some(subscribers) => subscribers
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
            None => return DispatchReport::default(),
        };

        if snapshot.is_empty() {
            return DispatchReport::default();
        }

        let (delivered, stale) = if snapshot.len() < SEQUENTIAL_DISPATCH_LIMIT {
            enqueue_batch(&snapshot, &payload)
        } else {
            self.dispatch_sharded(snapshot, payload).await
        };

        let evicted = stale.len();
        for client_id in stale {
            self.unsubscribe(item_id, client_id);
            info!(item_id = %item_id, client_id = %client_id, "slow subscriber evicted");
        }

        DispatchReport { delivered, evicted }
    }

    /// Large subscriber sets are split across a fixed worker pool; each
    /// worker runs the same non-blocking enqueue over its shard.
    async fn dispatch_sharded(
        &self,
        snapshot: Vec<(Uuid, mpsc::Sender<Bytes>)>,
        payload: Bytes,
    ) -> (usize, Vec<Uuid>) {
        let batch_size = snapshot.len().div_ceil(DISPATCH_WORKERS);
        let mut workers = Vec::with_capacity(DISPATCH_WORKERS);

        for batch in snapshot.chunks(batch_size) {
            let batch = batch.to_vec();
            let payload = payload.clone();
            workers.push(tokio::spawn(async move {
                enqueue_batch(&batch, &payload)
            }));
        }

        let mut delivered = 0;
        let mut stale = Vec::new();
        for worker in workers {
            if let Ok((count, mut batch_stale)) = worker.await {
                delivered += count;
                stale.append(&mut batch_stale);
            }
        }
        (delivered, stale)
    }

    /// Evict every subscriber. Their egress tasks observe the closed
    /// queues and send close frames.
    pub fn shutdown(&self) {
        let total: usize = self
            .items
            .iter()
            .map(|subscribers| subscribers.len())
            .sum();
        self.items.clear();
        info!(subscribers = total, "broadcast registry shut down");
    }
}

/// Non-blocking enqueue over a batch of subscribers. Returns the
/// delivered count and the ids whose queues were full or closed.
fn enqueue_batch(
    batch: &[(Uuid, mpsc::Sender<Bytes>)],
    payload: &Bytes,
) -> (usize, Vec<Uuid>) {
    let mut delivered = 0;
    let mut stale = Vec::new();
    for (client_id, sender) in batch {
        match sender.try_send(payload.clone()) {
            Ok(()) => delivered += 1,
            Err(_) => stale.push(*client_id),
        }
    }
    (delivered, stale)
}
