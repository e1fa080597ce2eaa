use crate::reading::{hour_of_day, HourSource, Reading, Window};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Electrical quantities derived from the last two readings of a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub apparent_power: f64,
    pub power_factor: f64,
    pub reactive_power: f64,
    pub power_delta: f64,
    pub power_rolling_std: f64,
    pub hour_of_day: u32,
    pub hour_source: HourSource,
}

/// Returns `None` only for an empty window.
pub fn extract(window: &Window, now: NaiveDateTime) -> Option<DerivedFeatures> {
    let current = window.current()?;
    let previous = window.previous().unwrap_or(current);

    let apparent = apparent_power(current);
    let hour = hour_of_day(current.timestamp.as_deref(), now);
    let powers: Vec<f64> = window.readings().iter().map(|r| r.power).collect();

    Some(DerivedFeatures {
        apparent_power: apparent,
        power_factor: power_factor(current.power, apparent),
        reactive_power: reactive_power(current.power, apparent),
        power_delta: current.power - previous.power,
        power_rolling_std: rolling_std(&powers),
        hour_of_day: hour.hour,
        hour_source: hour.source,
    })
}

pub fn apparent_power(r: &Reading) -> f64 {
    r.voltage_rms * r.current_rms
}

/// 1.0 when there is no apparent power.
pub fn power_factor(power: f64, apparent: f64) -> f64 {
    if apparent == 0.0 {
        1.0
    } else {
        power / apparent
    }
}

/// Radicand is clamped at zero; meter noise can make |P| exceed |S|.
pub fn reactive_power(power: f64, apparent: f64) -> f64 {
    (apparent * apparent - power * power).max(0.0).sqrt()
}

/// Population standard deviation (divides by N); 0.0 for fewer than two values.
pub fn rolling_std(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Input order expected by the appliance classifier.
pub fn classification_vector(current: &Reading, features: &DerivedFeatures) -> [f64; 7] {
    [
        current.current_rms,
        current.power,
        current.voltage_rms,
        current.cumulative_energy,
        features.power_delta,
        features.reactive_power,
        features.power_factor,
    ]
}

/// Input order expected by the anomaly predictor. Only the current reading
/// contributes.
pub fn anomaly_vector(current: &Reading, features: &DerivedFeatures) -> [f64; 4] {
    [
        current.voltage_rms,
        current.current_rms,
        current.power,
        features.hour_of_day as f64,
    ]
}
