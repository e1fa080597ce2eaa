use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::AppState;
use crate::api::models::{AcknowledgeResponse, AlertsQuery, NewAlertRequest};
use crate::error::Result;
use crate::store::Alert;

/// GET /api/v1/alerts?limit=
/// Most recent first.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<Alert>>> {
    let alerts = state.alerts.list(query.effective_limit()).await?;
    Ok(Json(alerts))
}

/// PUT /api/v1/alerts/{id}/acknowledge
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AcknowledgeResponse>> {
    state.alerts.acknowledge(&id).await?;
    Ok(Json(AcknowledgeResponse { id, is_read: true }))
}

/// POST /api/v1/alerts
pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<NewAlertRequest>,
) -> Result<(StatusCode, Json<Alert>)> {
    let alert = request.into_alert(Utc::now())?;
    state.alerts.push(&alert).await?;
    info!(id = %alert.id, severity = alert.severity.as_str(), "alert created");
    Ok((StatusCode::CREATED, Json(alert)))
}
