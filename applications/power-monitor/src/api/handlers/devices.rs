use axum::{extract::State, Json};

use super::AppState;
use crate::memory::DeviceRecord;

/// GET /api/v1/devices
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceRecord>> {
    Json(state.devices.snapshot())
}
