//! Silence watchdog for a subject's telemetry stream.
//!
//! Every arriving reading refreshes `last_seen_at` and re-arms the offline
//! latch. A background task checks at a fixed interval; once the silence
//! exceeds the threshold it declares every device offline, exactly once
//! per silence episode.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Side effect fired when a subject goes silent.
#[async_trait]
pub trait OfflineHandler: Send + Sync {
    async fn declare_all_offline(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatStatus {
    Active,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatSnapshot {
    pub subject: String,
    pub status: HeartbeatStatus,
    pub last_seen_at: DateTime<Utc>,
    pub elapsed_secs: i64,
    pub offline_triggered: bool,
}

#[derive(Debug)]
struct HeartbeatState {
    last_seen_at: DateTime<Utc>,
    offline_triggered: bool,
}

/// The shared "last seen" clock for one subject.
#[derive(Debug)]
pub struct Heartbeat {
    subject: String,
    threshold: Duration,
    state: Mutex<HeartbeatState>,
}

impl Heartbeat {
    pub fn new(subject: impl Into<String>, threshold: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            threshold,
            state: Mutex::new(HeartbeatState {
                last_seen_at: started_at,
                offline_triggered: false,
            }),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn record_reading_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.offline_triggered {
            info!(subject = %self.subject, "telemetry resumed");
        }
        state.last_seen_at = now;
        state.offline_triggered = false;
    }

    /// Sets the offline latch if the silence has just become too long.
    /// Returns the elapsed silence when the caller must fire the offline action.
    fn claim_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now - state.last_seen_at;
        if elapsed > self.threshold && !state.offline_triggered {
            state.offline_triggered = true;
            Some(elapsed)
        } else {
            None
        }
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> HeartbeatSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now - state.last_seen_at;
        let status = if elapsed > self.threshold {
            HeartbeatStatus::Stale
        } else {
            HeartbeatStatus::Active
        };
        HeartbeatSnapshot {
            subject: self.subject.clone(),
            status,
            last_seen_at: state.last_seen_at,
            elapsed_secs: elapsed.num_seconds(),
            offline_triggered: state.offline_triggered,
        }
    }
}

struct RunningTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Watchdog {
    heartbeat: Arc<Heartbeat>,
    handler: Arc<dyn OfflineHandler>,
    check_interval: std::time::Duration,
    task: Mutex<Option<RunningTask>>,
}

impl Watchdog {
    pub fn new(
        heartbeat: Arc<Heartbeat>,
        handler: Arc<dyn OfflineHandler>,
        check_interval: std::time::Duration,
    ) -> Self {
        Self {
            heartbeat,
            handler,
            check_interval,
            task: Mutex::new(None),
        }
    }

    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    /// One periodic check. Returns true when the offline action fired.
    pub async fn check_at(&self, now: DateTime<Utc>) -> bool {
        match self.heartbeat.claim_expiry(now) {
            Some(elapsed) => {
                warn!(
                    subject = %self.heartbeat.subject(),
                    elapsed_secs = elapsed.num_seconds(),
                    "heartbeat lost, declaring all devices offline"
                );
                self.handler.declare_all_offline().await;
                true
            }
            None => false,
        }
    }

    /// Spawn the periodic check. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let watchdog = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(
                subject = %watchdog.heartbeat.subject(),
                interval_ms = watchdog.check_interval.as_millis() as u64,
                "heartbeat watchdog started"
            );
            let mut ticker = tokio::time::interval(watchdog.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        watchdog.check_at(Utc::now()).await;
                    }
                }
            }
            debug!(subject = %watchdog.heartbeat.subject(), "heartbeat watchdog loop exited");
        });

        *task = Some(RunningTask { shutdown, handle });
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop the periodic check, waiting for a check in flight to finish.
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let running = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(RunningTask { shutdown, handle }) = running else {
            return;
        };
        // the loop may already have exited; nothing to signal then
        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "heartbeat watchdog task ended abnormally");
        }
        info!(subject = %self.heartbeat.subject(), "heartbeat watchdog stopped");
    }
}
