//! Vigil Discovery - Device workflows over the dispatcher
//!
//! This crate holds the domain logic that rides on the correlation
//! dispatcher:
//! - Reachability probing via the OS ping facility
//! - The per-request discovery saga
//! - The recurring polling scheduler for provisioned devices
//! - The telemetry sink that persists asynchronous polling results

pub mod poller;
pub mod probe;
pub mod sink;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use poller::PollingScheduler;
pub use probe::{PingProber, ReachabilityProbe};
pub use sink::TelemetrySink;
pub use workflow::{run_discovery, WorkflowTimeouts};
