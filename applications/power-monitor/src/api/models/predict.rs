use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EnergyForecastRequest {
    pub features: Vec<f64>,
}

impl EnergyForecastRequest {
    pub fn validated(&self) -> Result<&[f64]> {
        if self.features.is_empty() {
            return Err(AppError::InvalidInput("features must not be empty".into()));
        }
        if self.features.iter().any(|f| !f.is_finite()) {
            return Err(AppError::InvalidInput("features must be finite numbers".into()));
        }
        Ok(&self.features)
    }
}

#[derive(Debug, Serialize)]
pub struct EnergyForecastResponse {
    pub predicted_energy: f64,
}
