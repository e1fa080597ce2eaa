pub mod alerts;
pub mod analysis;
pub mod devices;
pub mod health;
pub mod heartbeat;

use crate::heartbeat::Heartbeat;
use crate::memory::MemoryStatusStore;
use crate::monitor::Monitor;
use crate::predictor::EnergyForecaster;
use crate::store::AlertSink;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub devices: Arc<MemoryStatusStore>,
    pub alerts: Arc<dyn AlertSink>,
    pub heartbeat: Arc<Heartbeat>,
    pub forecaster: Option<Arc<dyn EnergyForecaster>>,
}
