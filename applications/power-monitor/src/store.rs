//! Persistence seams. The telemetry store is read-only from here; device
//! status and alerts are written.

use crate::error::Result;
use crate::reading::Reading;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Last `limit` readings for `subject`, oldest first.
    async fn fetch_recent(&self, subject: &str, limit: usize) -> Result<Vec<Reading>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn from_label(label: i32) -> Self {
        if label != 0 {
            PowerState::On
        } else {
            PowerState::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == PowerState::On
    }

    /// Vocabulary of the keyed status store.
    pub fn switch_str(self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        }
    }

    /// Vocabulary of the device document store.
    pub fn presence_str(self) -> &'static str {
        match self {
            PowerState::On => "online",
            PowerState::Off => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatusUpdate {
    pub index: usize,
    pub name: String,
    pub state: PowerState,
    pub last_seen: DateTime<Utc>,
}

#[async_trait]
pub trait DeviceStatusStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn update_status(&self, update: &DeviceStatusUpdate) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl Alert {
    /// Fresh unread alert with a random id.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            severity,
            timestamp: now,
            is_read: false,
        }
    }

    pub fn fluctuation(device: &str, toggles: usize, observations: usize, now: DateTime<Utc>) -> Self {
        Self::new(
            "Device fluctuation detected",
            format!(
                "{} switched ON/OFF {} times in its last {} readings",
                device, toggles, observations
            ),
            Severity::High,
            now,
        )
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn push(&self, alert: &Alert) -> Result<()>;

    /// Most recent first.
    async fn list(&self, limit: i64) -> Result<Vec<Alert>>;

    /// Mark an alert read. `NotFound` if no such id.
    async fn acknowledge(&self, id: &str) -> Result<()>;
}
