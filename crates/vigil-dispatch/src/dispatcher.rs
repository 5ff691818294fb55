//! Correlation dispatcher
//!
//! One tokio task owns both the worker link and the routing table, so the
//! table has a single writer and needs no locking. Submissions arrive as
//! commands over an mpsc channel; the same task drains inbound replies on a
//! fixed tick and routes them by the reply's declared job kind.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_core::{Error, JobDispatcher, JobKind, JobReply, JobRequest, PolledData, Result};

use crate::link::WorkerLink;

/// Tuning for the dispatcher task.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker endpoint, e.g. "tcp://localhost:5555".
    pub endpoint: String,
    /// Inbound drain / eviction cadence.
    pub tick_interval: Duration,
    /// Max age for untracked (fire-and-forget) entries before eviction.
    pub pending_max_age: Duration,
    /// Grace added to an awaited entry's deadline beyond the caller's wait,
    /// so the caller always times out before its entry is swept.
    pub awaited_slack: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://localhost:5555".to_string(),
            tick_interval: Duration::from_millis(100),
            pending_max_age: Duration::from_secs(300),
            awaited_slack: Duration::from_secs(5),
        }
    }
}

type ReplyWaiter = oneshot::Sender<Result<JobReply>>;

/// One in-flight job awaiting its reply.
struct PendingJob {
    kind: JobKind,
    waiter: Option<ReplyWaiter>,
    deadline: Instant,
}

/// Correlation id -> pending job map with deadline-based eviction.
///
/// Owned exclusively by the dispatcher task.
struct RoutingTable {
    entries: HashMap<String, PendingJob>,
}

impl RoutingTable {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, correlation_id: String, job: PendingJob) {
        self.entries.insert(correlation_id, job);
    }

    /// Remove and return the entry for a reply, if one is pending.
    fn complete(&mut self, correlation_id: &str) -> Option<PendingJob> {
        self.entries.remove(correlation_id)
    }

    /// Drop every entry whose deadline has passed. Waiters of evicted
    /// awaited entries have already timed out on their own clock; dropping
    /// the sender releases them if they have not.
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, job| {
            if job.deadline <= now {
                debug!(correlation_id = %id, kind = %job.kind, "Evicting expired pending job");
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    /// Release every waiter with a cancellation error. Used at shutdown so
    /// no caller is left hanging on an abandoned job.
    fn cancel_all(&mut self) {
        for (id, job) in self.entries.drain() {
            if let Some(waiter) = job.waiter {
                debug!(correlation_id = %id, "Cancelling pending job at shutdown");
                let _ = waiter.send(Err(Error::Cancelled));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

enum Command {
    Submit {
        request: JobRequest,
        /// Present for awaited jobs; the reply is delivered here.
        waiter: Option<ReplyWaiter>,
        /// The caller's wait bound, used to derive the entry deadline.
        wait: Option<Duration>,
        /// Synchronous acknowledgement of the outbound write.
        ack: oneshot::Sender<Result<String>>,
    },
    Shutdown,
}

/// Handle to the dispatcher task.
///
/// Cloneable; all clones feed the same task and socket.
#[derive(Clone)]
pub struct Dispatcher {
    cmd_tx: mpsc::Sender<Command>,
}

impl Dispatcher {
    /// Connect the worker link and start the dispatcher task.
    ///
    /// Provisioning replies are routed to `telemetry_tx` rather than to any
    /// waiting caller.
    pub fn start(
        config: DispatcherConfig,
        telemetry_tx: mpsc::Sender<PolledData>,
    ) -> Result<Self> {
        let link = WorkerLink::connect(&config.endpoint)?;
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(run(link, config, cmd_rx, telemetry_tx));

        Ok(Self { cmd_tx })
    }

    /// Stop the dispatcher task, cancelling all pending jobs.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    async fn send_command(
        &self,
        request: JobRequest,
        waiter: Option<ReplyWaiter>,
        wait: Option<Duration>,
    ) -> Result<String> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit {
                request,
                waiter,
                wait,
                ack: ack_tx,
            })
            .await
            .map_err(|_| Error::Cancelled)?;
        ack_rx.await.map_err(|_| Error::Cancelled)?
    }
}

#[async_trait]
impl JobDispatcher for Dispatcher {
    async fn submit(&self, request: JobRequest) -> Result<String> {
        self.send_command(request, None, None).await
    }

    async fn submit_and_wait(&self, request: JobRequest, wait: Duration) -> Result<JobReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(request, Some(reply_tx), Some(wait))
            .await?;

        match tokio::time::timeout(wait, reply_rx).await {
            Err(_) => Err(Error::Timeout(wait)),
            Ok(Err(_)) => Err(Error::Cancelled),
            Ok(Ok(result)) => result,
        }
    }
}

async fn run(
    link: WorkerLink,
    config: DispatcherConfig,
    mut cmd_rx: mpsc::Receiver<Command>,
    telemetry_tx: mpsc::Sender<PolledData>,
) {
    let mut table = RoutingTable::new();
    let mut tick = tokio::time::interval(config.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        tick_ms = config.tick_interval.as_millis() as u64,
        "Dispatcher started"
    );

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Submit { request, waiter, wait, ack }) => {
                    handle_submit(&link, &config, &mut table, request, waiter, wait, ack);
                }
                Some(Command::Shutdown) | None => break,
            },
            _ = tick.tick() => {
                drain_inbound(&link, &mut table, &telemetry_tx);
                let evicted = table.sweep(Instant::now());
                if evicted > 0 {
                    warn!(evicted, pending = table.len(), "Evicted unanswered pending jobs");
                }
            }
        }
    }

    info!(pending = table.len(), "Dispatcher stopping");
    table.cancel_all();
}

fn handle_submit(
    link: &WorkerLink,
    config: &DispatcherConfig,
    table: &mut RoutingTable,
    request: JobRequest,
    waiter: Option<ReplyWaiter>,
    wait: Option<Duration>,
    ack: oneshot::Sender<Result<String>>,
) {
    let correlation_id = Uuid::new_v4().to_string();

    let payload = match serde_json::to_vec(&request) {
        Ok(payload) => payload,
        Err(e) => {
            let _ = ack.send(Err(Error::Transport(format!(
                "failed to serialize job payload: {e}"
            ))));
            return;
        }
    };

    if let Err(e) = link.send(&correlation_id, &payload) {
        warn!(correlation_id = %correlation_id, kind = %request.kind, error = %e, "Job submission failed");
        let _ = ack.send(Err(e));
        return;
    }

    let deadline = match wait {
        Some(wait) => Instant::now() + wait + config.awaited_slack,
        None => Instant::now() + config.pending_max_age,
    };
    table.insert(
        correlation_id.clone(),
        PendingJob {
            kind: request.kind,
            waiter,
            deadline,
        },
    );

    debug!(
        correlation_id = %correlation_id,
        kind = %request.kind,
        pending = table.len(),
        "Job submitted"
    );
    let _ = ack.send(Ok(correlation_id));
}

/// Drain every inbound frame currently available. Malformed frames are
/// logged and dropped; the loop itself never fails.
fn drain_inbound(
    link: &WorkerLink,
    table: &mut RoutingTable,
    telemetry_tx: &mpsc::Sender<PolledData>,
) {
    loop {
        let frame = match link.try_recv() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                // A persistent socket error must not spin the loop; the
                // next tick retries.
                warn!(error = %e, "Worker receive failed, deferring drain");
                break;
            }
        };

        let Some(pending) = table.complete(&frame.correlation_id) else {
            // Stale reply: the caller timed out and was evicted, or the
            // worker answered a job from a previous process lifetime.
            debug!(
                correlation_id = %frame.correlation_id,
                "Dropping reply with unknown correlation id"
            );
            continue;
        };

        let reply = match JobReply::decode(&frame.payload) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    correlation_id = %frame.correlation_id,
                    error = %e,
                    "Dropping unparseable worker reply"
                );
                if let Some(waiter) = pending.waiter {
                    let _ = waiter.send(Err(e));
                }
                continue;
            }
        };

        // Route by the reply's declared kind, not the submitted one: the
        // worker's classification decides whether anyone is waiting.
        match reply.kind {
            JobKind::Provisioning => {
                if pending.waiter.is_some() {
                    warn!(
                        correlation_id = %frame.correlation_id,
                        "Provisioning reply had a registered waiter; dropping the wait"
                    );
                }
                match PolledData::from_reply(reply) {
                    Some(data) => {
                        if let Err(e) = telemetry_tx.try_send(data) {
                            warn!(error = %e, "Telemetry channel full, dropping polled data");
                        }
                    }
                    None => warn!(
                        correlation_id = %frame.correlation_id,
                        "Provisioning reply missing discovery_profile_id, dropped"
                    ),
                }
            }
            JobKind::Discovery => match pending.waiter {
                Some(waiter) => {
                    let _ = waiter.send(Ok(reply));
                }
                None => debug!(
                    correlation_id = %frame.correlation_id,
                    "Discovery reply had no waiting caller"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(kind: JobKind, deadline: Instant) -> PendingJob {
        PendingJob {
            kind,
            waiter: None,
            deadline,
        }
    }

    #[tokio::test]
    async fn test_complete_removes_entry() {
        let mut table = RoutingTable::new();
        let deadline = Instant::now() + Duration::from_secs(60);
        table.insert("a".to_string(), pending(JobKind::Discovery, deadline));

        assert!(table.complete("a").is_some());
        assert!(table.complete("a").is_none());
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_correlation_id_is_a_miss() {
        let mut table = RoutingTable::new();
        let deadline = Instant::now() + Duration::from_secs(60);
        table.insert("a".to_string(), pending(JobKind::Discovery, deadline));

        assert!(table.complete("b").is_none());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired() {
        let mut table = RoutingTable::new();
        let now = Instant::now();
        table.insert("old".to_string(), pending(JobKind::Provisioning, now));
        table.insert(
            "fresh".to_string(),
            pending(JobKind::Provisioning, now + Duration::from_secs(60)),
        );

        let evicted = table.sweep(now + Duration::from_millis(1));
        assert_eq!(evicted, 1);
        assert!(table.complete("fresh").is_some());
        assert!(table.complete("old").is_none());
    }

    #[tokio::test]
    async fn test_cancel_all_releases_waiters() {
        let mut table = RoutingTable::new();
        let (tx, rx) = oneshot::channel();
        table.insert(
            "a".to_string(),
            PendingJob {
                kind: JobKind::Discovery,
                waiter: Some(tx),
                deadline: Instant::now() + Duration::from_secs(60),
            },
        );

        table.cancel_all();
        assert_eq!(table.len(), 0);
        match rx.await {
            Ok(Err(Error::Cancelled)) => {}
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
