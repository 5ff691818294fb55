//! In-memory fakes for workflow tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use vigil_core::{
    DiscoveryTarget, Error, JobDispatcher, JobReply, JobRequest, ProfileStore, Result,
};

use crate::probe::ReachabilityProbe;

fn good_credentials() -> Value {
    json!({"username": "admin", "password": "secret"})
}

#[derive(Default)]
struct StoreState {
    targets: HashMap<i32, (DiscoveryTarget, bool)>,
    discovery_status: HashMap<i32, i16>,
    appended: Vec<(i32, Value)>,
    appends_to_fail: usize,
}

/// Profile store fake backed by a plain map.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    fail_status_writes: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(self, id: i32, ip: &str, credentials: Value, provisioned: bool) -> Self {
        let target = DiscoveryTarget {
            profile_id: id,
            name: format!("device-{id}"),
            ip: ip.parse::<IpAddr>().unwrap(),
            system_type: "linux".to_string(),
            credentials,
        };
        self.state
            .lock()
            .unwrap()
            .targets
            .insert(id, (target, provisioned));
        self
    }

    pub fn with_target(self, id: i32, ip: &str) -> Self {
        self.add(id, ip, good_credentials(), false)
    }

    pub fn with_target_credentials(self, id: i32, ip: &str, credentials: Value) -> Self {
        self.add(id, ip, credentials, false)
    }

    pub fn with_provisioned_target(self, id: i32, ip: &str) -> Self {
        self.add(id, ip, good_credentials(), true)
    }

    pub fn with_provisioned_credentials(self, id: i32, ip: &str, credentials: Value) -> Self {
        self.add(id, ip, credentials, true)
    }

    pub fn failing_status_writes(mut self) -> Self {
        self.fail_status_writes = true;
        self
    }

    pub fn failing_appends_once(self) -> Self {
        self.state.lock().unwrap().appends_to_fail = 1;
        self
    }

    pub fn discovery_status(&self, id: i32) -> i16 {
        *self
            .state
            .lock()
            .unwrap()
            .discovery_status
            .get(&id)
            .unwrap_or(&0)
    }

    pub fn appended(&self) -> Vec<(i32, Value)> {
        self.state.lock().unwrap().appended.clone()
    }
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn discovery_target(&self, id: i32) -> Result<DiscoveryTarget> {
        self.state
            .lock()
            .unwrap()
            .targets
            .get(&id)
            .map(|(target, _)| target.clone())
            .ok_or_else(|| Error::profile_not_found(id))
    }

    async fn set_discovery_status(&self, id: i32, status: i16) -> Result<()> {
        if self.fail_status_writes {
            return Err(Error::Persistence("status write refused".into()));
        }
        self.state
            .lock()
            .unwrap()
            .discovery_status
            .insert(id, status);
        Ok(())
    }

    async fn set_provision_status(&self, _id: i32, _status: i16) -> Result<()> {
        Ok(())
    }

    async fn provisioned_targets(&self) -> Result<Vec<DiscoveryTarget>> {
        let state = self.state.lock().unwrap();
        let mut targets: Vec<DiscoveryTarget> = state
            .targets
            .values()
            .filter(|(_, provisioned)| *provisioned)
            .map(|(target, _)| target.clone())
            .collect();
        targets.sort_by_key(|t| t.profile_id);
        Ok(targets)
    }

    async fn append_system_data(
        &self,
        discovery_profile_id: i32,
        payload: &Value,
        _captured_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.appends_to_fail > 0 {
            state.appends_to_fail -= 1;
            return Err(Error::Persistence("append refused".into()));
        }
        state.appended.push((discovery_profile_id, payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct DispatcherState {
    submitted: Vec<JobRequest>,
    outcomes: VecDeque<Result<JobReply>>,
}

/// Dispatcher fake that records submissions and plays back scripted
/// outcomes for awaited jobs.
#[derive(Default)]
pub struct FakeDispatcher {
    state: Mutex<DispatcherState>,
    fail_submissions: bool,
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: JobReply) -> Self {
        self.state.lock().unwrap().outcomes.push_back(Ok(reply));
        self
    }

    pub fn with_error(self, error: Error) -> Self {
        self.state.lock().unwrap().outcomes.push_back(Err(error));
        self
    }

    pub fn failing_submissions(mut self) -> Self {
        self.fail_submissions = true;
        self
    }

    pub fn submitted(&self) -> Vec<JobRequest> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl JobDispatcher for FakeDispatcher {
    async fn submit(&self, request: JobRequest) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(request);
        if self.fail_submissions {
            return Err(Error::Transport("worker send failed".into()));
        }
        Ok(format!("corr-{}", state.submitted.len()))
    }

    async fn submit_and_wait(&self, request: JobRequest, wait: Duration) -> Result<JobReply> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(request);
        state
            .outcomes
            .pop_front()
            .unwrap_or(Err(Error::Timeout(wait)))
    }
}

/// Scripted reachability prober.
pub enum FakeProbe {
    Reachable,
    Unreachable,
    Hanging,
}

impl FakeProbe {
    pub fn reachable() -> Self {
        Self::Reachable
    }

    pub fn unreachable() -> Self {
        Self::Unreachable
    }

    pub fn hanging() -> Self {
        Self::Hanging
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn is_reachable(&self, _ip: IpAddr) -> Result<bool> {
        match self {
            Self::Reachable => Ok(true),
            Self::Unreachable => Ok(false),
            Self::Hanging => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            }
        }
    }
}
