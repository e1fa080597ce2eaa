//! Per-device ON/OFF history and the fluctuation alert latch.
//!
//! ```text
//!            fluctuating            fluctuating
//!   Armed ───────────────► Latched ─────────────► Latched (no alert)
//!     ▲                       │
//!     └───────────────────────┘
//!      `latch_reset_after` consecutive stable verdicts
//! ```
//!
//! Without `latch_reset_after` a latched device stays latched for the life
//! of the process.

use crate::config::DebounceConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    history: VecDeque<bool>,
    alerted: bool,
    stable_streak: usize,
}

impl DeviceState {
    pub fn history(&self) -> impl Iterator<Item = bool> + '_ {
        self.history.iter().copied()
    }

    pub fn alerted(&self) -> bool {
        self.alerted
    }

    fn toggles(&self) -> usize {
        self.history
            .iter()
            .zip(self.history.iter().skip(1))
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Outcome of feeding one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub fluctuating: bool,
    pub toggles: usize,
    pub observations: usize,
    /// True exactly when this observation latched the device.
    pub raise_alert: bool,
}

pub struct FluctuationDebouncer {
    config: DebounceConfig,
    devices: Mutex<HashMap<usize, DeviceState>>,
}

impl FluctuationDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            devices: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, device: usize, on: bool) -> Assessment {
        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let state = devices.entry(device).or_default();

        state.history.push_back(on);
        while state.history.len() > self.config.capacity {
            state.history.pop_front();
        }

        let observations = state.history.len();
        let toggles = state.toggles();
        let fluctuating = observations >= self.config.min_observations
            && toggles >= self.config.toggle_threshold;

        let mut raise_alert = false;
        if fluctuating {
            state.stable_streak = 0;
            if !state.alerted {
                state.alerted = true;
                raise_alert = true;
            }
        } else if state.alerted {
            state.stable_streak += 1;
            if let Some(reset_after) = self.config.latch_reset_after {
                if state.stable_streak >= reset_after {
                    tracing::debug!(device, "fluctuation latch cleared after stable run");
                    state.alerted = false;
                    state.stable_streak = 0;
                }
            }
        }

        Assessment {
            fluctuating,
            toggles,
            observations,
            raise_alert,
        }
    }

    pub fn snapshot(&self, device: usize) -> Option<DeviceState> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        devices.get(&device).cloned()
    }
}
