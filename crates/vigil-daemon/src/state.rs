//! Application state management

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use vigil_discovery::{PingProber, TelemetrySink, WorkflowTimeouts};
use vigil_dispatch::Dispatcher;
use vigil_store::PgStore;

use crate::config::Config;

/// How many polled results may queue between dispatcher and sink.
const TELEMETRY_QUEUE_DEPTH: usize = 256;

/// Shared application state
pub struct AppState {
    /// Profile and telemetry persistence
    pub store: Arc<PgStore>,
    /// Correlation dispatcher handle
    pub dispatcher: Arc<Dispatcher>,
    /// Reachability prober for discovery runs
    pub prober: PingProber,
    /// Deadlines for the discovery saga
    pub timeouts: WorkflowTimeouts,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Connect the store, start the dispatcher, and spawn the telemetry
    /// sink.
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let store = Arc::new(PgStore::connect(&config.database.url).await?);
        store.run_migrations().await?;

        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_QUEUE_DEPTH);
        let dispatcher = Arc::new(Dispatcher::start(
            config.to_dispatcher_config(),
            telemetry_tx,
        )?);

        let sink = TelemetrySink::new(store.clone(), telemetry_rx);
        tokio::spawn(sink.run());

        let prober = PingProber::new(config.polling.ping_attempts);
        let timeouts = config.to_workflow_timeouts();

        info!("Application state initialized");

        Ok(Arc::new(Self {
            store,
            dispatcher,
            prober,
            timeouts,
            config,
        }))
    }
}
