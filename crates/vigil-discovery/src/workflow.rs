//! Per-request discovery saga
//!
//! Load the target, gate on reachability, run the discovery job through
//! the dispatcher, and persist the status transition on success. Each
//! suspension point carries its own deadline; partial failure is never
//! reported as success.

use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use vigil_core::{
    Credentials, Error, JobDispatcher, JobRequest, JobStatus, ProfileStore, Result, DISCOVERED,
};

use crate::probe::ReachabilityProbe;

/// Deadlines for the saga's two suspension points.
#[derive(Debug, Clone)]
pub struct WorkflowTimeouts {
    /// Bound on the reachability check.
    pub ping: Duration,
    /// Bound on the discovery job reply.
    pub discovery: Duration,
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self {
            ping: Duration::from_secs(10),
            discovery: Duration::from_secs(30),
        }
    }
}

/// Run a discovery probe for the given profile and return the worker's
/// result document.
///
/// The discovery status flips to 1 only after a success reply *and* an
/// acknowledged status write; on any failure path the status is untouched.
pub async fn run_discovery(
    store: &dyn ProfileStore,
    dispatcher: &dyn JobDispatcher,
    prober: &dyn ReachabilityProbe,
    profile_id: i32,
    timeouts: &WorkflowTimeouts,
) -> Result<Value> {
    let target = store.discovery_target(profile_id).await?;

    info!(
        profile = profile_id,
        name = %target.name,
        ip = %target.ip,
        "Starting discovery run"
    );

    let reachable = tokio::time::timeout(timeouts.ping, prober.is_reachable(target.ip))
        .await
        .map_err(|_| Error::Timeout(timeouts.ping))??;
    if !reachable {
        warn!(profile = profile_id, ip = %target.ip, "Discovery aborted, device unreachable");
        return Err(Error::Unreachable(target.ip));
    }

    let creds = Credentials::from_config(&target.credentials)?;
    let request = JobRequest::discovery(&target, &creds);

    let reply = dispatcher
        .submit_and_wait(request, timeouts.discovery)
        .await?;

    match reply.status {
        JobStatus::Success => {
            // The status write must be acknowledged before the caller sees
            // success; otherwise a crashed write would leave an
            // undiscovered profile behind a "discovered" response.
            store.set_discovery_status(profile_id, DISCOVERED).await?;
            info!(profile = profile_id, "Discovery completed");
            Ok(reply
                .result
                .unwrap_or_else(|| Value::Object(Default::default())))
        }
        JobStatus::Failure => {
            let reason = reply.failure_reason();
            warn!(profile = profile_id, reason = %reason, "Worker reported discovery failure");
            Err(Error::WorkerFailure(reason))
        }
    }
}
