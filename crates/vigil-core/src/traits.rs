//! Seams between the workflows and their collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::job::{JobReply, JobRequest};
use crate::profile::DiscoveryTarget;

/// Relational persistence consumed by the discovery and polling workflows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a discovery profile joined with its credential profile.
    async fn discovery_target(&self, id: i32) -> Result<DiscoveryTarget>;

    /// Persist a discovery status transition.
    async fn set_discovery_status(&self, id: i32, status: i16) -> Result<()>;

    /// Persist a provision status transition, gated on the profile being
    /// discovered.
    async fn set_provision_status(&self, id: i32, status: i16) -> Result<()>;

    /// Every profile currently eligible for monitoring, joined with its
    /// credential profile.
    async fn provisioned_targets(&self) -> Result<Vec<DiscoveryTarget>>;

    /// Append one telemetry row for a profile.
    async fn append_system_data(
        &self,
        discovery_profile_id: i32,
        payload: &Value,
        captured_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Job submission interface exposed by the correlation dispatcher.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Submit a fire-and-forget job. Returns the correlation id once the
    /// outbound write is acknowledged; the eventual reply is consumed
    /// downstream, not by the submitter.
    async fn submit(&self, request: JobRequest) -> Result<String>;

    /// Submit a job and wait for its reply within `wait`.
    async fn submit_and_wait(&self, request: JobRequest, wait: Duration) -> Result<JobReply>;
}
