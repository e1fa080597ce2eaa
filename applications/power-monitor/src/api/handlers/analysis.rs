use axum::{extract::State, Json};

use super::AppState;
use crate::api::models::{EnergyForecastRequest, EnergyForecastResponse};
use crate::error::{AppError, Result};
use crate::monitor::{AnomalyOutcome, Identification};

/// POST /api/v1/identify
/// Runs an identification pass over the latest readings of the subject.
pub async fn identify(State(state): State<AppState>) -> Result<Json<Identification>> {
    let identification = state.monitor.identify_subject().await?;
    Ok(Json(identification))
}

/// GET /api/v1/anomaly
pub async fn detect_anomaly(State(state): State<AppState>) -> Result<Json<AnomalyOutcome>> {
    let outcome = state.monitor.detect_anomaly_for_subject().await?;
    Ok(Json(outcome))
}

/// POST /api/v1/predict/energy
pub async fn predict_energy(
    State(state): State<AppState>,
    Json(request): Json<EnergyForecastRequest>,
) -> Result<Json<EnergyForecastResponse>> {
    let forecaster = state
        .forecaster
        .as_ref()
        .ok_or_else(|| AppError::ModelUnavailable("no energy model configured".into()))?;
    let predicted_energy = forecaster.forecast(request.validated()?).await?;
    Ok(Json(EnergyForecastResponse { predicted_energy }))
}
