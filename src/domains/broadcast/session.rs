//! WebSocket session lifecycle for one spectator.
//!
//! Each connection gets a dedicated egress task reading from its bounded
//! queue, so slow socket writes never back up into dispatch. The read
//! half detects dead peers via a 60-second deadline refreshed on pong;
//! the egress half pings every 54 seconds and enforces a 10-second write
//! deadline.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domains::broadcast::Registry;

const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(54);
const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Drive one spectator connection to completion.
pub async fn serve_connection(socket: WebSocket, registry: Arc<Registry>, item_id: String) {
    let subscription = registry.subscribe(&item_id);
    let client_id = subscription.client_id;
    info!(item_id = %item_id, client_id = %client_id, "spectator connected");

    // One-shot welcome frame, queued ahead of any bid event
    let welcome = serde_json::json!({
        "type": "connected",
        "itemId": item_id,
        "clientId": client_id,
    })
    .to_string();
    if subscription.sender.try_send(Bytes::from(welcome)).is_err() {
        warn!(client_id = %client_id, "welcome frame dropped");
    }
    // From here the registry holds the only sender, so eviction closes
    // the queue
    drop(subscription.sender);

    let (ws_tx, ws_rx) = socket.split();
    let mut egress = tokio::spawn(egress_loop(ws_tx, subscription.receiver));
    let read = read_loop(ws_rx);
    tokio::pin!(read);

    tokio::select! {
        _ = &mut egress => {
            // Write error or eviction ended the session; stop reading
        }
        _ = &mut read => {
            // Peer went away; evict ourselves so the egress task drains
            // and sends the close frame
            registry.unsubscribe(&item_id, client_id);
            let _ = (&mut egress).await;
        }
    }

    registry.unsubscribe(&item_id, client_id);
    info!(item_id = %item_id, client_id = %client_id, "spectator disconnected");
}

/// Pump the outbound queue into the socket. Ends on write failure or
/// when the queue closes (eviction or shutdown), closing the connection.
async fn egress_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Bytes>,
) {
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_payload = queue.recv() => match maybe_payload {
                Some(payload) => {
                    let text = match String::from_utf8(payload.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("dropping non-utf8 payload");
                            continue;
                        }
                    };
                    if write_frame(&mut ws_tx, Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = write_frame(&mut ws_tx, Message::Close(None)).await;
                    return;
                }
            },
            _ = ping.tick() => {
                if write_frame(&mut ws_tx, Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: Message,
) -> Result<(), ()> {
    match timeout(WRITE_DEADLINE, ws_tx.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "websocket write failed");
            Err(())
        }
        Err(_) => {
            debug!("websocket write deadline exceeded");
            Err(())
        }
    }
}

/// Consume inbound frames until the peer disconnects or goes silent.
/// Spectators send nothing we act on; the loop exists to observe pongs,
/// closes, and errors.
async fn read_loop(mut ws_rx: SplitStream<WebSocket>) {
    let mut deadline = Instant::now() + READ_DEADLINE;
    loop {
        match timeout_at(deadline, ws_rx.next()).await {
            Err(_) => {
                debug!("read deadline expired, peer presumed dead");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "websocket read failed");
                return;
            }
            Ok(Some(Ok(Message::Close(_)))) => return,
            Ok(Some(Ok(Message::Pong(_)))) => {
                deadline = Instant::now() + READ_DEADLINE;
            }
            Ok(Some(Ok(_))) => {
                // Client chatter (including pings axum answers for us)
            }
        }
    }
}
