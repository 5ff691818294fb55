//! Vigil Dispatch - Request/reply correlation over a single worker link
//!
//! The external worker process performs the actual device discovery and
//! polling. All job traffic to it is multiplexed over one ZeroMQ DEALER
//! socket; this crate tags each outbound job with a correlation id and
//! demultiplexes inbound replies back to the right consumer.

pub mod dispatcher;
pub mod link;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use link::WorkerLink;
