//! Reachability probing via the OS ping facility

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_core::{Error, Result};

/// Per-probe reply wait passed to ping's `-W` flag, in seconds.
const PROBE_WAIT_SECS: u32 = 1;

/// Pause between consecutive probe attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Yes/no reachability check against a target address.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `Ok(false)` is a normal negative result; `Err(Error::Probe)` means
    /// the probe itself could not run.
    async fn is_reachable(&self, ip: IpAddr) -> Result<bool>;
}

/// Probes by spawning the system `ping` binary.
///
/// The process spawn is asynchronous, so probing never stalls the runtime
/// even when the target blackholes packets for the full reply wait.
#[derive(Debug, Clone)]
pub struct PingProber {
    attempts: u32,
}

impl PingProber {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    async fn ping_once(&self, ip: IpAddr) -> Result<bool> {
        let output = tokio::process::Command::new("ping")
            .args([
                "-c",
                "1",
                "-W",
                &PROBE_WAIT_SECS.to_string(),
                &ip.to_string(),
            ])
            .output()
            .await
            .map_err(|e| Error::Probe(format!("failed to invoke ping: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(output.status.success() && reports_zero_loss(&stdout))
    }
}

#[async_trait]
impl ReachabilityProbe for PingProber {
    async fn is_reachable(&self, ip: IpAddr) -> Result<bool> {
        for attempt in 0..self.attempts {
            if self.ping_once(ip).await? {
                debug!(ip = %ip, attempt = attempt + 1, "Ping succeeded");
                return Ok(true);
            }
            if attempt + 1 < self.attempts {
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
        warn!(ip = %ip, attempts = self.attempts, "Ping failed on every attempt");
        Ok(false)
    }
}

/// True when the ping summary line reports zero packet loss.
///
/// Matching must not use a bare substring test: "100% packet loss"
/// contains "0% packet loss".
fn reports_zero_loss(output: &str) -> bool {
    output.lines().any(|line| {
        line.split(',')
            .any(|field| field.trim().starts_with("0%") && field.contains("packet loss"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_loss_is_reachable() {
        let output = "3 packets transmitted, 3 received, 0% packet loss, time 2003ms";
        assert!(reports_zero_loss(output));
    }

    #[test]
    fn test_total_loss_is_not_reachable() {
        let output = "3 packets transmitted, 0 received, 100% packet loss, time 2031ms";
        assert!(!reports_zero_loss(output));
    }

    #[test]
    fn test_partial_loss_is_not_zero_loss() {
        let output = "4 packets transmitted, 3 received, 25% packet loss, time 3004ms";
        assert!(!reports_zero_loss(output));
    }

    #[test]
    fn test_unrelated_output_is_not_reachable() {
        assert!(!reports_zero_loss("ping: unknown host"));
        assert!(!reports_zero_loss(""));
    }
}
