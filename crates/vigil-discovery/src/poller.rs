//! Recurring polling scheduler for provisioned devices
//!
//! Each tick loads every provisioned profile and fans out one provisioning
//! job per profile. Submissions are fire-and-forget: the tick waits only
//! for the dispatcher's write acks (each with its own bound), never for
//! worker replies, and one bad profile never blocks its siblings.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vigil_core::{Credentials, JobDispatcher, JobRequest, ProfileStore, Result};

/// Fans polling jobs out to the dispatcher on a fixed period.
pub struct PollingScheduler {
    store: Arc<dyn ProfileStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    period: Duration,
    /// Bound on each submission's write ack.
    submit_ack: Duration,
}

impl PollingScheduler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        period: Duration,
        submit_ack: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            period,
            submit_ack,
        }
    }

    /// Run ticks forever. A failed tick is logged and the next one runs on
    /// schedule.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first poll should wait a full
        // period like every later one.
        tick.tick().await;

        info!(period_secs = self.period.as_secs(), "Polling scheduler started");

        loop {
            tick.tick().await;
            match self.run_tick().await {
                Ok(submitted) => debug!(submitted, "Polling tick completed"),
                Err(e) => warn!(error = %e, "Polling tick failed"),
            }
        }
    }

    /// Submit one provisioning job per provisioned profile. Returns how
    /// many submissions were attempted.
    pub async fn run_tick(&self) -> Result<usize> {
        let targets = self.store.provisioned_targets().await?;
        if targets.is_empty() {
            debug!("No provisioned profiles to poll");
            return Ok(0);
        }

        let mut submissions = JoinSet::new();

        for target in targets {
            let creds = match Credentials::from_config(&target.credentials) {
                Ok(creds) => creds,
                Err(e) => {
                    // Skip this profile only; the rest of the tick goes on.
                    warn!(
                        profile = target.profile_id,
                        error = %e,
                        "Skipping profile with malformed credential config"
                    );
                    continue;
                }
            };

            let request = JobRequest::provisioning(&target, &creds);
            let dispatcher = self.dispatcher.clone();
            let submit_ack = self.submit_ack;
            let profile_id = target.profile_id;

            submissions.spawn(async move {
                match tokio::time::timeout(submit_ack, dispatcher.submit(request)).await {
                    Ok(Ok(correlation_id)) => {
                        debug!(
                            profile = profile_id,
                            correlation_id = %correlation_id,
                            "Polling job submitted"
                        );
                    }
                    Ok(Err(e)) => {
                        warn!(profile = profile_id, error = %e, "Polling job submission failed")
                    }
                    Err(_) => {
                        warn!(profile = profile_id, "Polling job submission ack timed out")
                    }
                }
            });
        }

        let submitted = submissions.len();
        while submissions.join_next().await.is_some() {}
        Ok(submitted)
    }
}
