//! Telemetry readings as produced by the meter firmware.
//!
//! Timestamps travel as `YYYY-MM-DD_HH:MM:SS_mmm` strings. The format is
//! zero-padded and most-significant-first, so lexicographic order on the
//! raw strings equals chronological order; the telemetry store relies on
//! that for its sort key.

use crate::error::Result;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S_%3f";
const TIMESTAMP_FORMAT_NO_MILLIS: &str = "%Y-%m-%d_%H:%M:%S";

/// Hour used when a timestamp is present but unreadable.
pub const DEFAULT_HOUR: u32 = 12;

/// One meter sample. Missing numeric fields default to 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "Vrms", default)]
    pub voltage_rms: f64,
    #[serde(rename = "Irms", default)]
    pub current_rms: f64,
    #[serde(rename = "Power", default)]
    pub power: f64,
    #[serde(rename = "kWh", default)]
    pub cumulative_energy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Reading {
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Parsed timestamp, if present and well formed.
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT_NO_MILLIS))
        .ok()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Where an hour-of-day value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HourSource {
    Timestamp,
    /// No timestamp on the reading; the local wall clock was used.
    WallClock,
    /// Timestamp present but unreadable; [`DEFAULT_HOUR`] was used.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourOfDay {
    pub hour: u32,
    pub source: HourSource,
}

/// Hour of day for a reading, never failing.
///
/// The strict format is tried first, then a lenient `<date>_<HH>:...`
/// split so partially corrupted stamps still yield their hour.
pub fn hour_of_day(timestamp: Option<&str>, now: NaiveDateTime) -> HourOfDay {
    let raw = match timestamp.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return HourOfDay {
                hour: now.hour(),
                source: HourSource::WallClock,
            }
        }
    };

    if let Some(ts) = parse_timestamp(raw) {
        return HourOfDay {
            hour: ts.hour(),
            source: HourSource::Timestamp,
        };
    }

    let lenient = raw
        .split('_')
        .nth(1)
        .and_then(|time| time.split(':').next())
        .and_then(|h| h.parse::<u32>().ok())
        .filter(|h| *h < 24);

    match lenient {
        Some(hour) => HourOfDay {
            hour,
            source: HourSource::Timestamp,
        },
        None => {
            tracing::debug!(timestamp = %raw, "unreadable timestamp, using default hour");
            HourOfDay {
                hour: DEFAULT_HOUR,
                source: HourSource::Default,
            }
        }
    }
}

/// The most recent readings for one subject, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    readings: Vec<Reading>,
}

impl Window {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self { readings }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn current(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Second to last reading, or the current one for a single-reading window.
    pub fn previous(&self) -> Option<&Reading> {
        match self.readings.len() {
            0 => None,
            1 => self.readings.last(),
            n => self.readings.get(n - 2),
        }
    }
}

impl From<Vec<Reading>> for Window {
    fn from(readings: Vec<Reading>) -> Self {
        Self::new(readings)
    }
}
