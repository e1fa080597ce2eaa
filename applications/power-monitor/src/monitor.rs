//! Identification and anomaly passes over a window of readings.
//!
//! A [`Monitor`] owns the debounce state and holds every external
//! collaborator behind a trait object, so one instance is shared between
//! the listener, the heartbeat watchdog and the HTTP handlers.

use crate::config::{DebounceConfig, MonitorConfig};
use crate::debounce::FluctuationDebouncer;
use crate::error::{AppError, Result};
use crate::features::{self, DerivedFeatures};
use crate::gates::{self, Freshness};
use crate::heartbeat::OfflineHandler;
use crate::predictor::{AnomalyPredictor, DeviceClassifier};
use crate::reading::{Reading, Window};
use crate::store::{
    Alert, AlertSink, DeviceStatusStore, DeviceStatusUpdate, PowerState, TelemetryStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External collaborators injected at construction.
pub struct Collaborators {
    pub classifier: Arc<dyn DeviceClassifier>,
    pub anomaly: Arc<dyn AnomalyPredictor>,
    pub telemetry: Arc<dyn TelemetryStore>,
    /// Every store here receives every device transition.
    pub status_stores: Vec<Arc<dyn DeviceStatusStore>>,
    pub alerts: Arc<dyn AlertSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationOutcome {
    Classified,
    /// Latest reading older than the freshness limit; all devices set offline.
    Stale,
    /// Latest reading below the active-load floor; all devices set offline.
    LowPower,
    /// No readings; nothing was touched.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceVerdict {
    pub index: usize,
    pub name: String,
    pub on: bool,
    pub fluctuating: bool,
    pub toggles: usize,
    pub alert_raised: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    pub outcome: IdentificationOutcome,
    /// One 0/1 entry per configured device, in classifier order.
    pub states: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
}

impl Identification {
    fn all_off(outcome: IdentificationOutcome, devices: usize, freshness: Option<Freshness>) -> Self {
        Self {
            outcome,
            states: vec![0; devices],
            devices: Vec::new(),
            freshness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub is_anomaly: bool,
    /// Model score when the predictor exposes one, else 0.0.
    pub anomaly_score: f64,
    pub prediction: i32,
    pub reading: Reading,
    pub features: DerivedFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnomalyOutcome {
    InsufficientData,
    Evaluated(AnomalyReport),
}

pub struct Monitor {
    subject: String,
    identification_window: usize,
    anomaly_window: usize,
    max_reading_age: Duration,
    min_active_power_w: f64,
    devices: Vec<String>,
    debouncer: FluctuationDebouncer,
    collaborators: Collaborators,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        debounce: DebounceConfig,
        devices: Vec<String>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            subject: config.subject.clone(),
            identification_window: config.identification_window,
            anomaly_window: config.anomaly_window,
            max_reading_age: Duration::seconds(config.max_reading_age_secs),
            min_active_power_w: config.min_active_power_w,
            devices,
            debouncer: FluctuationDebouncer::new(debounce),
            collaborators,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn device_names(&self) -> &[String] {
        &self.devices
    }

    pub fn debouncer(&self) -> &FluctuationDebouncer {
        &self.debouncer
    }

    pub fn identification_window(&self) -> usize {
        self.identification_window
    }

    /// Last `limit` readings of the configured subject.
    pub async fn fetch_window(&self, limit: usize) -> Result<Window> {
        let readings = self
            .collaborators
            .telemetry
            .fetch_recent(&self.subject, limit)
            .await?;
        Ok(Window::new(readings))
    }

    /// Fetch the identification window for the configured subject and classify it.
    pub async fn identify_subject(&self) -> Result<Identification> {
        let window = self.fetch_window(self.identification_window).await?;
        self.identify_at(&window, Local::now().naive_local(), Utc::now())
            .await
    }

    /// Fetch the anomaly window for the configured subject and evaluate it.
    pub async fn detect_anomaly_for_subject(&self) -> Result<AnomalyOutcome> {
        let window = self.fetch_window(self.anomaly_window).await?;
        self.detect_anomaly_at(&window, Local::now().naive_local())
            .await
    }

    /// `now_local` is compared with producer timestamps; `now_utc` stamps
    /// status updates and alerts.
    pub async fn identify_at(
        &self,
        window: &Window,
        now_local: NaiveDateTime,
        now_utc: DateTime<Utc>,
    ) -> Result<Identification> {
        let device_count = self.devices.len();
        let Some(current) = window.current() else {
            debug!(subject = %self.subject, "no readings to identify");
            return Ok(Identification::all_off(
                IdentificationOutcome::InsufficientData,
                device_count,
                None,
            ));
        };

        let freshness = gates::check_freshness(current, now_local, self.max_reading_age);
        match freshness {
            Freshness::Stale { age_secs } => {
                warn!(subject = %self.subject, age_secs, "latest reading is stale");
                self.set_all_offline_at(now_utc).await;
                return Ok(Identification::all_off(
                    IdentificationOutcome::Stale,
                    device_count,
                    Some(freshness),
                ));
            }
            Freshness::Unknown => {
                debug!(subject = %self.subject, "reading has no usable timestamp, skipping freshness check");
            }
            Freshness::Fresh { .. } => {}
        }

        if gates::is_low_power(current, self.min_active_power_w) {
            debug!(subject = %self.subject, power = current.power, "no active load");
            self.set_all_offline_at(now_utc).await;
            return Ok(Identification::all_off(
                IdentificationOutcome::LowPower,
                device_count,
                Some(freshness),
            ));
        }

        let Some(derived) = features::extract(window, now_local) else {
            return Ok(Identification::all_off(
                IdentificationOutcome::InsufficientData,
                device_count,
                Some(freshness),
            ));
        };
        let vector = features::classification_vector(current, &derived);
        let labels = self.collaborators.classifier.classify(&vector).await?;
        if labels.len() != device_count {
            return Err(AppError::Prediction(format!(
                "classifier returned {} labels for {} devices",
                labels.len(),
                device_count
            )));
        }

        let mut states = Vec::with_capacity(device_count);
        let mut verdicts = Vec::with_capacity(device_count);
        for (index, (name, label)) in self.devices.iter().zip(labels).enumerate() {
            let state = PowerState::from_label(label);
            self.write_status(&DeviceStatusUpdate {
                index,
                name: name.clone(),
                state,
                last_seen: now_utc,
            })
            .await;

            let assessment = self.debouncer.observe(index, state.is_on());
            if assessment.raise_alert {
                warn!(
                    device = %name,
                    toggles = assessment.toggles,
                    observations = assessment.observations,
                    "device is fluctuating"
                );
                let alert = Alert::fluctuation(
                    name,
                    assessment.toggles,
                    assessment.observations,
                    now_utc,
                );
                if let Err(e) = self.collaborators.alerts.push(&alert).await {
                    error!(device = %name, alert_id = %alert.id, error = %e, "failed to store fluctuation alert");
                }
            }

            states.push(u8::from(state.is_on()));
            verdicts.push(DeviceVerdict {
                index,
                name: name.clone(),
                on: state.is_on(),
                fluctuating: assessment.fluctuating,
                toggles: assessment.toggles,
                alert_raised: assessment.raise_alert,
            });
        }

        info!(subject = %self.subject, states = ?states, "devices identified");
        Ok(Identification {
            outcome: IdentificationOutcome::Classified,
            states,
            devices: verdicts,
            freshness: Some(freshness),
        })
    }

    pub async fn detect_anomaly_at(
        &self,
        window: &Window,
        now_local: NaiveDateTime,
    ) -> Result<AnomalyOutcome> {
        let (Some(current), Some(derived)) = (window.current(), features::extract(window, now_local))
        else {
            return Ok(AnomalyOutcome::InsufficientData);
        };

        let vector = features::anomaly_vector(current, &derived);
        let prediction = self.collaborators.anomaly.predict(&vector).await?;
        if prediction.is_anomaly() {
            warn!(subject = %self.subject, power = current.power, score = ?prediction.score, "anomalous reading");
        }

        Ok(AnomalyOutcome::Evaluated(AnomalyReport {
            is_anomaly: prediction.is_anomaly(),
            anomaly_score: prediction.score.unwrap_or(0.0),
            prediction: prediction.label,
            reading: current.clone(),
            features: derived,
        }))
    }

    /// Mark every configured device OFF in every status store.
    pub async fn set_all_offline_at(&self, now: DateTime<Utc>) {
        for (index, name) in self.devices.iter().enumerate() {
            self.write_status(&DeviceStatusUpdate {
                index,
                name: name.clone(),
                state: PowerState::Off,
                last_seen: now,
            })
            .await;
        }
    }

    async fn write_status(&self, update: &DeviceStatusUpdate) {
        for store in &self.collaborators.status_stores {
            if let Err(e) = store.update_status(update).await {
                error!(
                    store = store.name(),
                    device = %update.name,
                    error = %e,
                    "failed to write device status"
                );
            }
        }
    }
}

#[async_trait]
impl OfflineHandler for Monitor {
    async fn declare_all_offline(&self) {
        self.set_all_offline_at(Utc::now()).await;
    }
}
