// Real-Time Auction Backend - Core
//
// This crate provides the three services of the bidding platform: an API
// gateway making atomic bid decisions against Redis, a broadcast service
// fanning accepted bids out to WebSocket spectators, and an archival worker
// draining the durable event stream into PostgreSQL.
//
// Binaries live in src/bin/, one per service. They share this library.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
