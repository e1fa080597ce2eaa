//! Rarity-based anomaly detector.
//!
//! Keeps a count of every (bucketed) value seen so far and flags a value
//! whose relative frequency is below `alert_threshold`. It needs no trained
//! model, so it serves as the anomaly predictor when no model endpoint is
//! configured. Early observations are judged against very few samples and
//! are therefore rarely flagged until the histogram fills up.
//!
//! As a predictor it keys on real power only. Zero power is judged by
//! rarity like any other value.

use crate::error::Result;
use crate::predictor::{AnomalyPrediction, AnomalyPredictor, ANOMALOUS_LABEL};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Index of real power within the anomaly feature vector.
const POWER_FEATURE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyVerdict {
    pub frequency: f64,
    pub anomalous: bool,
}

#[derive(Debug, Default)]
struct Histogram {
    total: u64,
    counts: HashMap<i64, u64>,
}

pub struct FrequencyDetector {
    alert_threshold: f64,
    bucket_width: f64,
    histogram: Mutex<Histogram>,
}

impl FrequencyDetector {
    pub fn new(alert_threshold: f64, bucket_width: f64) -> Self {
        Self {
            alert_threshold,
            bucket_width,
            histogram: Mutex::new(Histogram::default()),
        }
    }

    fn bucket(&self, value: f64) -> i64 {
        (value / self.bucket_width).round() as i64
    }

    /// Record `value` and judge how rare it is among everything seen.
    /// Non-finite values are not recorded and never anomalous.
    pub fn observe(&self, value: f64) -> FrequencyVerdict {
        if !value.is_finite() {
            return FrequencyVerdict {
                frequency: 1.0,
                anomalous: false,
            };
        }
        let key = self.bucket(value);
        let mut hist = self.histogram.lock().unwrap_or_else(PoisonError::into_inner);
        hist.total += 1;
        let count = {
            let c = hist.counts.entry(key).or_insert(0);
            *c += 1;
            *c
        };
        let frequency = count as f64 / hist.total as f64;
        FrequencyVerdict {
            frequency,
            anomalous: frequency < self.alert_threshold,
        }
    }

    pub fn observations(&self) -> u64 {
        self.histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }
}

#[async_trait]
impl AnomalyPredictor for FrequencyDetector {
    async fn predict(&self, features: &[f64; 4]) -> Result<AnomalyPrediction> {
        let verdict = self.observe(features[POWER_FEATURE]);
        Ok(AnomalyPrediction {
            label: if verdict.anomalous { ANOMALOUS_LABEL } else { 1 },
            score: Some(verdict.frequency),
        })
    }
}
