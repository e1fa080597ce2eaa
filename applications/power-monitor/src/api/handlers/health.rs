use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use super::AppState;
use crate::heartbeat::HeartbeatStatus;

/// Liveness plus a summary of the telemetry stream. Always 200; a silent
/// meter is not a service failure.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.heartbeat.snapshot_at(Utc::now());
    Json(json!({
        "status": "ok",
        "subject": snapshot.subject,
        "telemetry": match snapshot.status {
            HeartbeatStatus::Active => "active",
            HeartbeatStatus::Stale => "stale",
        },
    }))
}
