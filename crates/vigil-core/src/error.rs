//! Error taxonomy for the discovery and polling workflows

use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the workflows and the dispatcher.
///
/// Every variant carries a human-readable reason; nothing below maps to a
/// stack trace crossing the API boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("device at {0} is not reachable")]
    Unreachable(IpAddr),
    #[error("reachability probe failed: {0}")]
    Probe(String),
    #[error("worker transport error: {0}")]
    Transport(String),
    #[error("no reply from worker within {0:?}")]
    Timeout(Duration),
    #[error("worker reported failure: {0}")]
    WorkerFailure(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("job cancelled: dispatcher shut down")]
    Cancelled,
}

impl Error {
    /// Shorthand for the not-found variant on a discovery profile id.
    pub fn profile_not_found(id: i32) -> Self {
        Self::NotFound(format!("discovery profile {id}"))
    }
}
