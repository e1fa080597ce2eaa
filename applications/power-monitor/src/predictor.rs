//! Trained models live outside this service; these traits are the seam.

use crate::config::EndpointConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anomaly verdict convention: a label of -1 means anomalous.
pub const ANOMALOUS_LABEL: i32 = -1;

/// Per-device ON/OFF classifier. Labels come back in the fixed device order;
/// non-zero means ON.
#[async_trait]
pub trait DeviceClassifier: Send + Sync {
    async fn classify(&self, features: &[f64; 7]) -> Result<Vec<i32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AnomalyPrediction {
    pub label: i32,
    #[serde(default)]
    pub score: Option<f64>,
}

impl AnomalyPrediction {
    pub fn is_anomaly(&self) -> bool {
        self.label == ANOMALOUS_LABEL
    }
}

#[async_trait]
pub trait AnomalyPredictor: Send + Sync {
    async fn predict(&self, features: &[f64; 4]) -> Result<AnomalyPrediction>;
}

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    features: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct ClassifierResponse {
    labels: Vec<i32>,
}

/// Classifier served over HTTP: POST `{"features": [...]}` → `{"labels": [...]}`.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(endpoint)?,
            url: endpoint.url.clone(),
        })
    }
}

#[async_trait]
impl DeviceClassifier for HttpClassifier {
    async fn classify(&self, features: &[f64; 7]) -> Result<Vec<i32>> {
        let body: ClassifierResponse = post_features(&self.client, &self.url, features).await?;
        Ok(body.labels)
    }
}

/// Anomaly model served over HTTP: POST `{"features": [...]}` →
/// `{"label": -1, "score": -0.12}`.
pub struct HttpAnomalyPredictor {
    client: reqwest::Client,
    url: String,
}

impl HttpAnomalyPredictor {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(endpoint)?,
            url: endpoint.url.clone(),
        })
    }
}

#[async_trait]
impl AnomalyPredictor for HttpAnomalyPredictor {
    async fn predict(&self, features: &[f64; 4]) -> Result<AnomalyPrediction> {
        post_features(&self.client, &self.url, features).await
    }
}

/// Energy regressor. Feature length is whatever the served model was trained on.
#[async_trait]
pub trait EnergyForecaster: Send + Sync {
    async fn forecast(&self, features: &[f64]) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct EnergyResponse {
    predicted_energy: f64,
}

/// Energy model served over HTTP: POST `{"features": [...]}` →
/// `{"predicted_energy": 1.42}`.
pub struct HttpEnergyForecaster {
    client: reqwest::Client,
    url: String,
}

impl HttpEnergyForecaster {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(endpoint)?,
            url: endpoint.url.clone(),
        })
    }
}

#[async_trait]
impl EnergyForecaster for HttpEnergyForecaster {
    async fn forecast(&self, features: &[f64]) -> Result<f64> {
        let body: EnergyResponse = post_features(&self.client, &self.url, features).await?;
        Ok(body.predicted_energy)
    }
}

fn build_client(endpoint: &EndpointConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_millis(endpoint.timeout_ms))
        .build()?)
}

async fn post_features<T>(client: &reqwest::Client, url: &str, features: &[f64]) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let response = client
        .post(url)
        .json(&FeatureRequest { features })
        .send()
        .await
        .map_err(|e| AppError::ModelUnavailable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if status.is_server_error() {
        return Err(AppError::ModelUnavailable(format!(
            "{} answered {}",
            url, status
        )));
    }
    if !status.is_success() {
        return Err(AppError::Prediction(format!("{} answered {}", url, status)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Prediction(format!("unreadable response from {}: {}", url, e)))
}
