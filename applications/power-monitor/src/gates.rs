//! Checks that run before any model is consulted.

use crate::reading::Reading;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Freshness {
    Fresh { age_secs: i64 },
    Stale { age_secs: i64 },
    /// Timestamp missing or unreadable; the caller proceeds as if fresh.
    Unknown,
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

/// Compare a reading's producer timestamp against the local wall clock.
///
/// Producer stamps are naive local time, so `now` must be naive local too.
pub fn check_freshness(reading: &Reading, now: NaiveDateTime, max_age: Duration) -> Freshness {
    let Some(recorded) = reading.recorded_at() else {
        return Freshness::Unknown;
    };
    let age = now - recorded;
    let age_secs = age.num_seconds();
    if age > max_age {
        Freshness::Stale { age_secs }
    } else {
        Freshness::Fresh { age_secs }
    }
}

/// True when real power is below the level of any tracked load.
pub fn is_low_power(reading: &Reading, min_active_power_w: f64) -> bool {
    reading.power < min_active_power_w
}
