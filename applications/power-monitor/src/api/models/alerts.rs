use crate::error::{AppError, Result};
use crate::store::{Alert, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALERT_LIMIT: i64 = 50;
pub const MAX_ALERT_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<i64>,
}

impl AlertsQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ALERT_LIMIT)
            .clamp(1, MAX_ALERT_LIMIT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeResponse {
    pub id: String,
    pub is_read: bool,
}

/// Body of `POST /api/v1/alerts`. Id, timestamp and read flag are assigned here.
#[derive(Debug, Deserialize)]
pub struct NewAlertRequest {
    #[serde(default = "default_title")]
    pub title: String,
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_title() -> String {
    "Manual alert".into()
}

fn default_severity() -> Severity {
    Severity::Medium
}

impl NewAlertRequest {
    pub fn into_alert(self, now: DateTime<Utc>) -> Result<Alert> {
        if self.message.trim().is_empty() {
            return Err(AppError::InvalidInput("alert message must not be empty".into()));
        }
        Ok(Alert::new(self.title, self.message, self.severity, now))
    }
}
