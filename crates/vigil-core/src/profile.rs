//! Profile records for tracked network devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Status value for a profile that has not been discovered/provisioned.
pub const NOT_DISCOVERED: i16 = 0;
/// Status value after a successful discovery run.
pub const DISCOVERED: i16 = 1;
/// Status value for a profile not yet marked for monitoring.
pub const NOT_PROVISIONED: i16 = 0;
/// Status value for a profile eligible for recurring polling.
pub const PROVISIONED: i16 = 1;

/// A named credential set, referenced by discovery profiles.
///
/// The `config` document is opaque to the store; jobs built from it require
/// at least `username` and `password` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub id: i32,
    pub name: String,
    pub system_type: String,
    pub config: Value,
}

/// Fields for creating or updating a credential profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCredentialProfile {
    pub name: String,
    pub system_type: String,
    pub config: Value,
}

/// A registered target device with its discovery/provisioning state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryProfile {
    pub id: i32,
    pub name: String,
    pub ip: IpAddr,
    pub credential_profile_id: i32,
    pub discovery_status: i16,
    pub provision_status: i16,
}

impl DiscoveryProfile {
    pub fn is_discovered(&self) -> bool {
        self.discovery_status == DISCOVERED
    }

    pub fn is_provisioned(&self) -> bool {
        self.provision_status == PROVISIONED
    }
}

/// Fields for creating or updating a discovery profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscoveryProfile {
    pub name: String,
    pub ip: IpAddr,
    pub credential_profile_id: i32,
}

/// A discovery profile joined with its credential profile, as loaded for
/// job construction.
#[derive(Debug, Clone)]
pub struct DiscoveryTarget {
    pub profile_id: i32,
    pub name: String,
    pub ip: IpAddr,
    pub system_type: String,
    pub credentials: Value,
}

/// One appended telemetry row for a discovery profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemData {
    pub discovery_profile_id: i32,
    pub system_info: Value,
    pub captured_at: DateTime<Utc>,
}

/// Login credentials extracted from a credential configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Extract username/password from an opaque credential document.
    ///
    /// A document without both keys is malformed for job purposes even if
    /// it was accepted at profile creation.
    pub fn from_config(config: &Value) -> Result<Self> {
        let username = config
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("credential config is missing username".into()))?;
        let password = config
            .get("password")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("credential config is missing password".into()))?;
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}
