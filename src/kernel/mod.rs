//! Kernel module - infrastructure adapters shared by the services.

pub mod nats;
pub mod redis;
pub mod shutdown;

pub use self::nats::{
    ensure_stream, EventPublisher, NatsEventPublisher, PublishedEvent, TestPublisher,
};
pub use self::redis::{create_redis_pool, verify_connectivity};
pub use self::shutdown::shutdown_signal;
