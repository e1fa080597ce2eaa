//! Fakes for the external collaborators of the monitor.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use power_monitor::config::{DebounceConfig, MonitorConfig};
use power_monitor::error::{AppError, Result};
use power_monitor::monitor::{Collaborators, Monitor};
use power_monitor::predictor::{
    AnomalyPrediction, AnomalyPredictor, DeviceClassifier, EnergyForecaster,
};
use power_monitor::reading::{format_timestamp, Reading};
use power_monitor::store::{Alert, AlertSink, DeviceStatusStore, DeviceStatusUpdate, TelemetryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const DEVICES: [&str; 3] = ["Bulb 7W", "Bulb 12W", "Bulb 15W"];

/// Classifier that replays a script of label vectors, repeating the last one.
pub struct FakeClassifier {
    script: Mutex<Vec<Vec<i32>>>,
    calls: AtomicUsize,
    unavailable: bool,
}

impl FakeClassifier {
    pub fn always(labels: Vec<i32>) -> Self {
        Self::scripted(vec![labels])
    }

    pub fn scripted(script: Vec<Vec<i32>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            unavailable: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceClassifier for FakeClassifier {
    async fn classify(&self, _features: &[f64; 7]) -> Result<Vec<i32>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::ModelUnavailable("classifier not loaded".into()));
        }
        let script = self.script.lock().unwrap();
        Ok(script[n.min(script.len() - 1)].clone())
    }
}

pub struct FakeAnomaly {
    pub prediction: AnomalyPrediction,
    pub seen: Mutex<Vec<[f64; 4]>>,
}

impl FakeAnomaly {
    pub fn new(label: i32, score: Option<f64>) -> Self {
        Self {
            prediction: AnomalyPrediction { label, score },
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnomalyPredictor for FakeAnomaly {
    async fn predict(&self, features: &[f64; 4]) -> Result<AnomalyPrediction> {
        self.seen.lock().unwrap().push(*features);
        Ok(self.prediction)
    }
}

/// Energy model answering a fixed value, or `ModelUnavailable` when `None`.
pub struct FakeForecaster {
    pub value: Option<f64>,
    pub seen: Mutex<Vec<Vec<f64>>>,
}

impl FakeForecaster {
    pub fn returning(value: f64) -> Self {
        Self {
            value: Some(value),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: None,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EnergyForecaster for FakeForecaster {
    async fn forecast(&self, features: &[f64]) -> Result<f64> {
        self.seen.lock().unwrap().push(features.to_vec());
        self.value
            .ok_or_else(|| AppError::ModelUnavailable("energy model not loaded".into()))
    }
}

/// Telemetry for a single subject, kept oldest first.
#[derive(Default)]
pub struct FakeTelemetry {
    readings: Mutex<Vec<Reading>>,
    pub requested_limits: Mutex<Vec<usize>>,
}

impl FakeTelemetry {
    pub fn with(readings: Vec<Reading>) -> Self {
        Self {
            readings: Mutex::new(readings),
            requested_limits: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, reading: Reading) {
        self.readings.lock().unwrap().push(reading);
    }
}

#[async_trait]
impl TelemetryStore for FakeTelemetry {
    async fn fetch_recent(&self, _subject: &str, limit: usize) -> Result<Vec<Reading>> {
        self.requested_limits.lock().unwrap().push(limit);
        let readings = self.readings.lock().unwrap();
        let skip = readings.len().saturating_sub(limit);
        Ok(readings[skip..].to_vec())
    }
}

#[derive(Default)]
pub struct FailingTelemetry {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl TelemetryStore for FailingTelemetry {
    async fn fetch_recent(&self, _subject: &str, _limit: usize) -> Result<Vec<Reading>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Store("telemetry table unreachable".into()))
    }
}

#[derive(Default)]
pub struct RecordingStatusStore {
    pub updates: Mutex<Vec<DeviceStatusUpdate>>,
}

impl RecordingStatusStore {
    pub fn updates(&self) -> Vec<DeviceStatusUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceStatusStore for RecordingStatusStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn update_status(&self, update: &DeviceStatusUpdate) -> Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

pub struct FailingStatusStore;

#[async_trait]
impl DeviceStatusStore for FailingStatusStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn update_status(&self, _update: &DeviceStatusUpdate) -> Result<()> {
        Err(AppError::Store("document store offline".into()))
    }
}

#[derive(Default)]
pub struct FakeAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl FakeAlerts {
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for FakeAlerts {
    async fn push(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn list(&self, limit: i64) -> Result<Vec<Alert>> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        let mut alerts = self.alerts.lock().unwrap();
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.is_read = true;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("alert {}", id))),
        }
    }
}

#[derive(Default)]
pub struct FailingAlerts {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AlertSink for FailingAlerts {
    async fn push(&self, _alert: &Alert) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Store("alert collection unavailable".into()))
    }

    async fn list(&self, _limit: i64) -> Result<Vec<Alert>> {
        Ok(Vec::new())
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        Err(AppError::NotFound(format!("alert {}", id)))
    }
}

pub fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        subject: "meter-1".into(),
        identification_window: 7,
        anomaly_window: 20,
        max_reading_age_secs: 60,
        min_active_power_w: 1.0,
    }
}

pub fn device_names() -> Vec<String> {
    DEVICES.iter().map(|d| d.to_string()).collect()
}

pub fn build_monitor(debounce: DebounceConfig, collaborators: Collaborators) -> Monitor {
    Monitor::new(&monitor_config(), debounce, device_names(), collaborators)
}

/// Local wall clock truncated to the millisecond precision of the wire format.
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    let millis = now.nanosecond() / 1_000_000;
    now.with_nanosecond(millis * 1_000_000).unwrap_or(now)
}

/// A reading of `power` watts stamped `secs_ago` before `now`.
pub fn reading_at(power: f64, now: NaiveDateTime, secs_ago: i64) -> Reading {
    Reading {
        voltage_rms: 230.0,
        current_rms: power / 230.0,
        power,
        cumulative_energy: 4.2,
        timestamp: Some(format_timestamp(&(now - Duration::seconds(secs_ago)))),
    }
}

/// `count` readings one second apart ending at `now`, oldest first.
pub fn steady_window(power: f64, now: NaiveDateTime, count: i64) -> Vec<Reading> {
    (0..count)
        .rev()
        .map(|secs_ago| reading_at(power, now, secs_ago))
        .collect()
}
