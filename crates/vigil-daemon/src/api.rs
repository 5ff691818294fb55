//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;
use vigil_core::{Error, NewCredentialProfile, NewDiscoveryProfile, ProfileStore, PROVISIONED};
use vigil_discovery::workflow;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Unreachable(_) | Error::Transport(_) | Error::WorkerFailure(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Probe(_) | Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Map a workflow error to a JSON error body. The reason string is the
/// only detail that crosses the boundary.
fn error_response(err: Error) -> Response {
    (status_for(&err), Json(ApiError::new(err.to_string()))).into_response()
}

/// Create a credential profile
pub async fn create_credential_profile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCredentialRequest>,
) -> impl IntoResponse {
    let profile = match request.validate() {
        Ok(profile) => profile,
        Err(e) => return error_response(e),
    };

    match state.store.create_credential_profile(&profile).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"status": "success", "id": id})),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// List all credential profiles
pub async fn list_credential_profiles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.credential_profiles().await {
        Ok(profiles) => Json(profiles).into_response(),
        Err(e) => error_response(e),
    }
}

/// Get a credential profile by id
pub async fn get_credential_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.store.credential_profile(id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(e),
    }
}

/// Update a credential profile
pub async fn update_credential_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<CreateCredentialRequest>,
) -> impl IntoResponse {
    let profile = match request.validate() {
        Ok(profile) => profile,
        Err(e) => return error_response(e),
    };

    match state.store.update_credential_profile(id, &profile).await {
        Ok(()) => Json(serde_json::json!({"status": "success", "id": id})).into_response(),
        Err(e) => error_response(e),
    }
}

/// Delete a credential profile; rejected while referenced
pub async fn delete_credential_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.store.delete_credential_profile(id).await {
        Ok(()) => Json(serde_json::json!({"status": "success", "id": id})).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct CreateCredentialRequest {
    pub name: String,
    pub system_type: String,
    pub config: Value,
}

impl CreateCredentialRequest {
    fn validate(self) -> Result<NewCredentialProfile, Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("credential profile name is required".into()));
        }
        if self.system_type.trim().is_empty() {
            return Err(Error::Validation("system type is required".into()));
        }
        if !self.config.is_object() {
            return Err(Error::Validation(
                "credential config must be a JSON object".into(),
            ));
        }
        Ok(NewCredentialProfile {
            name: self.name,
            system_type: self.system_type,
            config: self.config,
        })
    }
}

#[derive(Deserialize)]
pub struct CreateDiscoveryRequest {
    pub name: String,
    pub ip: String,
    pub credential_profile_id: i32,
}

impl CreateDiscoveryRequest {
    fn validate(self) -> Result<NewDiscoveryProfile, Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("discovery profile name is required".into()));
        }
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| Error::Validation(format!("invalid target address: {}", self.ip)))?;
        Ok(NewDiscoveryProfile {
            name: self.name,
            ip,
            credential_profile_id: self.credential_profile_id,
        })
    }
}

/// Create a discovery profile
pub async fn create_discovery_profile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateDiscoveryRequest>,
) -> impl IntoResponse {
    let profile = match request.validate() {
        Ok(profile) => profile,
        Err(e) => return error_response(e),
    };

    match state.store.create_discovery_profile(&profile).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"status": "success", "id": id})),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// List all discovery profiles
pub async fn list_discovery_profiles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.discovery_profiles().await {
        Ok(profiles) => Json(profiles).into_response(),
        Err(e) => error_response(e),
    }
}

/// Get a discovery profile by id
pub async fn get_discovery_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.store.discovery_profile(id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(e),
    }
}

/// Update a discovery profile's address and credential reference
pub async fn update_discovery_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<CreateDiscoveryRequest>,
) -> impl IntoResponse {
    let profile = match request.validate() {
        Ok(profile) => profile,
        Err(e) => return error_response(e),
    };

    match state
        .store
        .update_discovery_profile(id, profile.ip, profile.credential_profile_id)
        .await
    {
        Ok(()) => Json(serde_json::json!({"status": "success", "id": id})).into_response(),
        Err(e) => error_response(e),
    }
}

/// Delete a discovery profile
pub async fn delete_discovery_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.store.delete_discovery_profile(id).await {
        Ok(()) => Json(serde_json::json!({"status": "success", "id": id})).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct DiscoveryRunRequest {
    pub id: i32,
}

/// Run the discovery saga for a profile
pub async fn run_discovery(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DiscoveryRunRequest>,
) -> impl IntoResponse {
    info!(profile = request.id, "Discovery run requested");

    let result = workflow::run_discovery(
        state.store.as_ref(),
        state.dispatcher.as_ref(),
        &state.prober,
        request.id,
        &state.timeouts,
    )
    .await;

    match result {
        Ok(result) => Json(serde_json::json!({
            "status": "success",
            "result": result,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ProvisionRequest {
    pub discovery_profile_id: i32,
    pub provision_status: i16,
}

/// Mark a discovered profile as provisioned for monitoring
pub async fn provision(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProvisionRequest>,
) -> impl IntoResponse {
    if request.provision_status != PROVISIONED {
        return error_response(Error::Validation(
            "provision_status must be 1; un-provisioning is not supported".into(),
        ));
    }

    match state
        .store
        .set_provision_status(request.discovery_profile_id, request.provision_status)
        .await
    {
        Ok(()) => Json(serde_json::json!({
            "status": "success",
            "id": request.discovery_profile_id,
        }))
        .into_response(),
        // The discovery-status gate is a state conflict, not bad input.
        Err(Error::Validation(reason)) => {
            (StatusCode::CONFLICT, Json(ApiError::new(reason))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Telemetry history for a provisioned profile
pub async fn provisioned_data(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.store.system_data(id).await {
        Ok(rows) => Json(serde_json::json!({
            "discovery_profile_id": id,
            "system_info": rows.iter().map(|r| &r.system_info).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}
