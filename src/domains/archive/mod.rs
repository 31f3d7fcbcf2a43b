//! Durable event pipeline: JetStream consumer and relational archive.

pub mod consumer;
pub mod database;

pub use consumer::{run_consumer, CONSUMER_NAME};
pub use database::{BidArchive, MemoryArchive, PostgresArchive};
