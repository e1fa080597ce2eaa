use crate::error::Result;
use crate::store::{DeviceStatusStore, DeviceStatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Record served by `GET /api/v1/devices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub index: usize,
    pub name: String,
    pub status: &'static str,
    pub is_active: bool,
    pub last_seen: DateTime<Utc>,
}

/// Fast status store keyed by device index.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    devices: Mutex<BTreeMap<usize, DeviceRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All known devices in index order.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<DeviceRecord> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
            .cloned()
    }
}

#[async_trait]
impl DeviceStatusStore for MemoryStatusStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn update_status(&self, update: &DeviceStatusUpdate) -> Result<()> {
        let record = DeviceRecord {
            index: update.index,
            name: update.name.clone(),
            status: update.state.switch_str(),
            is_active: update.state.is_on(),
            last_seen: update.last_seen,
        };
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(update.index, record);
        Ok(())
    }
}
