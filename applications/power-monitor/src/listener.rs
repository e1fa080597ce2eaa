//! Turns change notifications into identification passes.

use crate::error::Result;
use crate::heartbeat::Heartbeat;
use crate::monitor::{Identification, Monitor};
use crate::reading::Reading;
use crate::redpanda::{self, RedpandaConsumer};
use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Listener {
    monitor: Arc<Monitor>,
    heartbeat: Arc<Heartbeat>,
}

impl Listener {
    pub fn new(monitor: Arc<Monitor>, heartbeat: Arc<Heartbeat>) -> Self {
        Self { monitor, heartbeat }
    }

    /// Handle one notification. Returns `None` when there was nothing to do.
    pub async fn handle_notification(&self, payload: Option<&[u8]>) -> Result<Option<Identification>> {
        let payload = match payload {
            Some(p) if !p.is_empty() => p,
            _ => {
                debug!("ignoring notification without payload");
                return Ok(None);
            }
        };

        // data arrived, whatever happens to the fetch below
        self.heartbeat.record_reading_at(Utc::now());

        match Reading::from_json(payload) {
            Ok(reading) => {
                debug!(power = reading.power, timestamp = ?reading.timestamp, "notification carries a reading")
            }
            Err(e) => {
                warn!(error = %e, "notification payload is not a reading, using stored telemetry only")
            }
        }

        let window = self
            .monitor
            .fetch_window(self.monitor.identification_window())
            .await?;

        let identification = self
            .monitor
            .identify_at(&window, Local::now().naive_local(), Utc::now())
            .await?;
        Ok(Some(identification))
    }

    /// Consume notifications until the task is aborted.
    pub async fn run(self: Arc<Self>, consumer: RedpandaConsumer) {
        info!(subject = %self.monitor.subject(), "listening for telemetry notifications");
        loop {
            match redpanda::receive_notification(&consumer).await {
                Ok(Some(notification)) => {
                    if let Err(e) = self.handle_notification(notification.payload.as_deref()).await {
                        warn!(
                            topic = %notification.topic,
                            offset = notification.offset,
                            error = %e,
                            "identification failed for notification"
                        );
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("redpanda error: {e}; continuing after short delay");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}
