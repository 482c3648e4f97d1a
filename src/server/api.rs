//! Request/response API
//!
//! Every handler absorbs bad input: unknown device ids produce empty results
//! or lazily created mailboxes, and malformed registration bodies register a
//! device with default fields. No route returns an error payload.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;

use super::listener::GatewayState;
use crate::commands::PendingCommand;
use crate::devices::{Device, DeviceId, Registration};
use crate::relay::StreamStatus;
use crate::stats::RelayStats;

/// Routes for the request API
pub(crate) fn routes() -> Router<GatewayState> {
    Router::new()
        .route("/api/registrar", post(register_device))
        .route("/api/comandos/{device_id}", get(poll_commands))
        .route("/api/bloquear/{device_id}", post(lock_device))
        .route("/api/desbloquear/{device_id}", post(unlock_device))
        .route("/api/camera/start/{device_id}", post(start_camera))
        .route("/api/camera/stop/{device_id}", post(stop_camera))
        .route("/api/camera/status/{device_id}", get(camera_status))
        .route("/api/dispositivos", get(list_devices))
        .route("/api/relay/stats", get(relay_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub device_id: DeviceId,
}

#[derive(Debug, Serialize)]
pub struct CommandsResponse {
    pub commands: Vec<PendingCommand>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CameraAck {
    pub success: bool,
    pub message: String,
}

async fn register_device(State(state): State<GatewayState>, body: Bytes) -> Json<RegisterResponse> {
    let registration = Registration::from_json(&body);
    let device_id = state.hub.register(registration).await;

    Json(RegisterResponse {
        success: true,
        device_id,
    })
}

async fn poll_commands(
    State(state): State<GatewayState>,
    Path(device_id): Path<DeviceId>,
) -> Json<CommandsResponse> {
    let commands = state.hub.poll_commands(&device_id).await;
    Json(CommandsResponse { commands })
}

async fn lock_device(State(state): State<GatewayState>, Path(device_id): Path<DeviceId>) -> Json<Ack> {
    state.hub.lock(&device_id).await;
    Json(Ack { success: true })
}

async fn unlock_device(
    State(state): State<GatewayState>,
    Path(device_id): Path<DeviceId>,
) -> Json<Ack> {
    state.hub.unlock(&device_id).await;
    Json(Ack { success: true })
}

async fn start_camera(
    State(state): State<GatewayState>,
    Path(device_id): Path<DeviceId>,
) -> Json<CameraAck> {
    state.hub.start_camera(&device_id).await;
    Json(CameraAck {
        success: true,
        message: format!("Camera start requested for {}", device_id),
    })
}

async fn stop_camera(
    State(state): State<GatewayState>,
    Path(device_id): Path<DeviceId>,
) -> Json<CameraAck> {
    state.hub.stop_camera(&device_id).await;
    Json(CameraAck {
        success: true,
        message: format!("Camera stop requested for {}", device_id),
    })
}

async fn camera_status(
    State(state): State<GatewayState>,
    Path(device_id): Path<DeviceId>,
) -> Json<StreamStatus> {
    Json(state.hub.camera_status(&device_id).await)
}

async fn list_devices(State(state): State<GatewayState>) -> Json<Vec<Device>> {
    Json(state.hub.list_devices().await)
}

async fn relay_stats(State(state): State<GatewayState>) -> Json<RelayStats> {
    Json(state.hub.relay_stats().await)
}
