//! # chardb-client
//!
//! Client library for chardb.
//!
//! This crate provides:
//! - Event-driven TCP connection running on a single task
//! - Request tracking with one request in flight per connection
//! - High-level async API that awaits each operation's outcome

pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod tracker;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use event::{ConnectionEvent, EventReceiver};
pub use tracker::{RequestTracker, TrackerState};
