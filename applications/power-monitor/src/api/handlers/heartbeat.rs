use axum::{extract::State, Json};
use chrono::Utc;

use super::AppState;
use crate::heartbeat::HeartbeatSnapshot;

/// GET /api/v1/heartbeat
pub async fn heartbeat_status(State(state): State<AppState>) -> Json<HeartbeatSnapshot> {
    Json(state.heartbeat.snapshot_at(Utc::now()))
}
