//! HTTP server setup and routing

use anyhow::Result;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use vigil_discovery::PollingScheduler;

use crate::api;
use crate::state::AppState;

/// Run the API server and the polling scheduler.
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = Router::new()
        .route("/api/credential-profile", post(api::create_credential_profile))
        .route("/api/credential-profile", get(api::list_credential_profiles))
        .route("/api/credential-profile/{id}", get(api::get_credential_profile))
        .route("/api/credential-profile/{id}", put(api::update_credential_profile))
        .route("/api/credential-profile/{id}", delete(api::delete_credential_profile))
        .route("/api/discovery-profile", post(api::create_discovery_profile))
        .route("/api/discovery-profile", get(api::list_discovery_profiles))
        .route("/api/discovery-profile/{id}", get(api::get_discovery_profile))
        .route("/api/discovery-profile/{id}", put(api::update_discovery_profile))
        .route("/api/discovery-profile/{id}", delete(api::delete_discovery_profile))
        .route("/api/discovery-run", post(api::run_discovery))
        .route("/api/provision", post(api::provision))
        .route("/api/provision/{id}", get(api::provisioned_data))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state.clone());

    // Start polling provisioned devices in the background
    let scheduler = PollingScheduler::new(
        state.store.clone(),
        state.dispatcher.clone(),
        state.config.poll_period(),
        state.config.submit_ack_timeout(),
    );
    tokio::spawn(scheduler.run());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting API server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release any callers still waiting on worker replies.
    state.dispatcher.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
