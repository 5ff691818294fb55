//! Wire contract with the external worker process
//!
//! Jobs travel as a correlation-ID frame followed by a JSON document. Field
//! names (`RequestType`, `SystemType`, lowercase credentials) are fixed by
//! the worker and must not drift.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::profile::{Credentials, DiscoveryTarget};

/// The two job classes the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// One-time probe retrieving identifying system information.
    Discovery,
    /// Recurring telemetry poll against a provisioned device.
    Provisioning,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Discovery => write!(f, "discovery"),
            JobKind::Provisioning => write!(f, "provisioning"),
        }
    }
}

/// Outcome reported by the worker in a reply envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failure,
}

/// Outbound job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(rename = "RequestType")]
    pub kind: JobKind,
    pub ip: String,
    pub username: String,
    pub password: String,
    #[serde(rename = "SystemType")]
    pub system_type: String,
    /// Carried end-to-end on provisioning jobs so the reply can be routed
    /// to the owning profile's telemetry without dispatcher bookkeeping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_profile_id: Option<i32>,
}

impl JobRequest {
    pub fn discovery(target: &DiscoveryTarget, creds: &Credentials) -> Self {
        Self {
            kind: JobKind::Discovery,
            ip: target.ip.to_string(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            system_type: target.system_type.clone(),
            discovery_profile_id: None,
        }
    }

    pub fn provisioning(target: &DiscoveryTarget, creds: &Credentials) -> Self {
        Self {
            kind: JobKind::Provisioning,
            ip: target.ip.to_string(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            system_type: target.system_type.clone(),
            discovery_profile_id: Some(target.profile_id),
        }
    }
}

/// Inbound reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReply {
    #[serde(rename = "RequestType")]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(default)]
    pub discovery_profile_id: Option<i32>,
}

impl JobReply {
    /// Decode a reply payload.
    ///
    /// The worker sometimes double-encodes: the frame holds a JSON string
    /// whose content is the actual envelope. One level of string wrapping
    /// is unwrapped before parsing.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| Error::Transport(format!("malformed reply payload: {e}")))?;
        let envelope = match value {
            Value::String(inner) => serde_json::from_str(&inner)
                .map_err(|e| Error::Transport(format!("malformed reply payload: {e}")))?,
            other => other,
        };
        serde_json::from_value(envelope)
            .map_err(|e| Error::Transport(format!("malformed reply envelope: {e}")))
    }

    /// Flatten the failure body into a reason string.
    pub fn failure_reason(&self) -> String {
        match &self.errors {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "worker returned no error detail".to_string(),
        }
    }
}

/// A polling result routed from the dispatcher to the telemetry sink.
///
/// `payload` is the worker's result body on success or its error body on
/// failure; both are persisted.
#[derive(Debug, Clone)]
pub struct PolledData {
    pub discovery_profile_id: i32,
    pub payload: Value,
}

impl PolledData {
    /// Build a telemetry record from a provisioning reply.
    ///
    /// Returns `None` when the reply carries no owning profile id; such a
    /// reply cannot be attributed and is dropped by the caller.
    pub fn from_reply(reply: JobReply) -> Option<Self> {
        let discovery_profile_id = reply.discovery_profile_id?;
        let payload = match reply.status {
            JobStatus::Success => reply.result.unwrap_or_else(|| Value::Object(Default::default())),
            JobStatus::Failure => reply.errors.unwrap_or_else(|| Value::Object(Default::default())),
        };
        Some(Self {
            discovery_profile_id,
            payload,
        })
    }
}
