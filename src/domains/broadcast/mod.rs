//! Fan-out broadcast core: per-item subscriber registry, WebSocket
//! sessions, and the NATS ingress feeding them.

pub mod ingress;
pub mod registry;
pub mod session;

pub use registry::{DispatchReport, Registry, Subscription, OUTBOUND_QUEUE_CAPACITY};
