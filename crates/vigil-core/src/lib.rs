//! Vigil Core - Shared types and component seams
//!
//! This crate provides the foundational pieces for the Vigil system:
//! - Profile records (credential sets, discovery targets, telemetry rows)
//! - The wire contract spoken with the external worker process
//! - The error taxonomy surfaced by the workflows
//! - The `ProfileStore` and `JobDispatcher` traits that the domain
//!   workflows are written against

pub mod error;
pub mod job;
pub mod profile;
pub mod traits;

pub use error::{Error, Result};
pub use job::{JobKind, JobReply, JobRequest, JobStatus, PolledData};
pub use profile::{
    CredentialProfile, Credentials, DiscoveryProfile, DiscoveryTarget, NewCredentialProfile,
    NewDiscoveryProfile, SystemData, DISCOVERED, NOT_DISCOVERED, NOT_PROVISIONED, PROVISIONED,
};
pub use traits::{JobDispatcher, ProfileStore};
