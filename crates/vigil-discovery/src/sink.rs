//! Telemetry sink for asynchronous polling results
//!
//! Consumes polled data routed out of the dispatcher and appends it to the
//! owning profile's time-series history. Failed polls are telemetry too:
//! the error body is recorded the same way a result body is.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use vigil_core::{PolledData, ProfileStore, Result};

/// Appends polled data to per-profile history rows.
pub struct TelemetrySink {
    store: Arc<dyn ProfileStore>,
    rx: mpsc::Receiver<PolledData>,
}

impl TelemetrySink {
    pub fn new(store: Arc<dyn ProfileStore>, rx: mpsc::Receiver<PolledData>) -> Self {
        Self { store, rx }
    }

    /// Consume the channel until every sender is gone. A failed append is
    /// logged and the sink keeps consuming.
    pub async fn run(mut self) {
        while let Some(data) = self.rx.recv().await {
            let profile = data.discovery_profile_id;
            if let Err(e) = self.persist(data).await {
                error!(profile, error = %e, "Failed to persist polled data");
            }
        }
        info!("Telemetry channel closed, sink stopping");
    }

    async fn persist(&self, data: PolledData) -> Result<()> {
        let captured_at = Utc::now();

        // Stamp the document as well as the row so exported payloads stay
        // self-describing.
        let mut payload = data.payload;
        if let Some(doc) = payload.as_object_mut() {
            doc.insert("timestamp".to_string(), Value::String(captured_at.to_rfc3339()));
        }

        self.store
            .append_system_data(data.discovery_profile_id, &payload, captured_at)
            .await?;

        debug!(profile = data.discovery_profile_id, "Polled data persisted");
        Ok(())
    }
}
