mod common;

use chrono::{Duration, Utc};
use common::*;
use power_monitor::config::DebounceConfig;
use power_monitor::error::AppError;
use power_monitor::heartbeat::{Heartbeat, Watchdog};
use power_monitor::memory::MemoryStatusStore;
use power_monitor::monitor::{AnomalyOutcome, Collaborators, IdentificationOutcome, Monitor};
use power_monitor::reading::{Reading, Window};
use power_monitor::store::{DeviceStatusStore, PowerState};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Harness {
    monitor: Arc<Monitor>,
    classifier: Arc<FakeClassifier>,
    anomaly: Arc<FakeAnomaly>,
    recorder: Arc<RecordingStatusStore>,
    memory: Arc<MemoryStatusStore>,
    alerts: Arc<FakeAlerts>,
}

fn harness(classifier: FakeClassifier, debounce: DebounceConfig) -> Harness {
    let classifier = Arc::new(classifier);
    let anomaly = Arc::new(FakeAnomaly::new(1, None));
    let recorder = Arc::new(RecordingStatusStore::default());
    let memory = Arc::new(MemoryStatusStore::new());
    let alerts = Arc::new(FakeAlerts::default());
    let monitor = Arc::new(build_monitor(
        debounce,
        Collaborators {
            classifier: classifier.clone(),
            anomaly: anomaly.clone(),
            telemetry: Arc::new(FakeTelemetry::default()),
            status_stores: vec![
                memory.clone() as Arc<dyn DeviceStatusStore>,
                recorder.clone(),
            ],
            alerts: alerts.clone(),
        },
    ));
    Harness {
        monitor,
        classifier,
        anomaly,
        recorder,
        memory,
        alerts,
    }
}

#[tokio::test]
async fn test_stale_reading_declares_all_offline_without_classifying() {
    let h = harness(FakeClassifier::always(vec![1, 1, 1]), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(vec![reading_at(40.0, now, 130), reading_at(40.0, now, 120)]);

    let id = h.monitor.identify_at(&window, now, Utc::now()).await.unwrap();

    assert_eq!(id.outcome, IdentificationOutcome::Stale);
    assert_eq!(id.states, vec![0, 0, 0]);
    assert_eq!(h.classifier.calls(), 0);
    let updates = h.recorder.updates();
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|u| u.state == PowerState::Off));
}

#[tokio::test]
async fn test_reading_exactly_at_limit_is_fresh() {
    let h = harness(FakeClassifier::always(vec![0, 1, 0]), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(vec![reading_at(12.0, now, 60)]);

    let id = h.monitor.identify_at(&window, now, Utc::now()).await.unwrap();

    assert_eq!(id.outcome, IdentificationOutcome::Classified);
    assert_eq!(h.classifier.calls(), 1);
}

#[tokio::test]
async fn test_low_power_gate() {
    let h = harness(FakeClassifier::always(vec![1, 0, 0]), DebounceConfig::default());
    let now = now_local();

    let id = h
        .monitor
        .identify_at(&Window::new(vec![reading_at(0.5, now, 1)]), now, Utc::now())
        .await
        .unwrap();
    assert_eq!(id.outcome, IdentificationOutcome::LowPower);
    assert_eq!(id.states, vec![0, 0, 0]);
    assert_eq!(h.classifier.calls(), 0);

    let id = h
        .monitor
        .identify_at(&Window::new(vec![reading_at(12.0, now, 1)]), now, Utc::now())
        .await
        .unwrap();
    assert_eq!(id.outcome, IdentificationOutcome::Classified);
    assert_eq!(id.states, vec![1, 0, 0]);
    assert_eq!(h.classifier.calls(), 1);
}

#[tokio::test]
async fn test_missing_timestamp_skips_freshness_check() {
    let h = harness(FakeClassifier::always(vec![0, 0, 1]), DebounceConfig::default());
    let reading = Reading {
        voltage_rms: 231.0,
        current_rms: 0.07,
        power: 15.0,
        cumulative_energy: 2.0,
        timestamp: None,
    };

    let id = h
        .monitor
        .identify_at(&Window::new(vec![reading]), now_local(), Utc::now())
        .await
        .unwrap();

    assert_eq!(id.outcome, IdentificationOutcome::Classified);
    assert_eq!(h.classifier.calls(), 1);
}

#[tokio::test]
async fn test_steady_window_updates_every_device_without_alert() {
    let h = harness(FakeClassifier::always(vec![1, 0, 1]), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 7));
    let stamp = Utc::now();

    let id = h.monitor.identify_at(&window, now, stamp).await.unwrap();

    assert_eq!(id.states, vec![1, 0, 1]);
    let updates = h.recorder.updates();
    let seen: Vec<(usize, &str, PowerState)> = updates
        .iter()
        .map(|u| (u.index, u.name.as_str(), u.state))
        .collect();
    assert_eq!(
        seen,
        vec![
            (0, "Bulb 7W", PowerState::On),
            (1, "Bulb 12W", PowerState::Off),
            (2, "Bulb 15W", PowerState::On),
        ]
    );
    assert!(updates.iter().all(|u| u.last_seen == stamp));
    assert!(h.alerts.all().is_empty());

    let devices = h.memory.snapshot();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[1].status, "OFF");
    assert_eq!(devices[2].status, "ON");
}

#[tokio::test]
async fn test_classifier_failure_leaves_state_untouched() {
    let h = harness(FakeClassifier::unavailable(), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 7));

    let err = h.monitor.identify_at(&window, now, Utc::now()).await.unwrap_err();

    assert!(matches!(err, AppError::ModelUnavailable(_)));
    assert!(h.recorder.updates().is_empty());
    assert!(h.monitor.debouncer().snapshot(0).is_none());
}

#[tokio::test]
async fn test_label_count_mismatch_is_rejected() {
    let h = harness(FakeClassifier::always(vec![1, 0]), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 3));

    let err = h.monitor.identify_at(&window, now, Utc::now()).await.unwrap_err();

    assert!(matches!(err, AppError::Prediction(_)));
    assert!(h.recorder.updates().is_empty());
    assert!(h.monitor.debouncer().snapshot(1).is_none());
}

#[tokio::test]
async fn test_alternating_device_alerts_once() {
    let script: Vec<Vec<i32>> = (0..12).map(|i| vec![1, i % 2, 1]).collect();
    let h = harness(FakeClassifier::scripted(script), DebounceConfig::default());
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 7));

    let mut fluctuating_from = None;
    for pass in 0..12 {
        let id = h.monitor.identify_at(&window, now, Utc::now()).await.unwrap();
        if id.devices[1].fluctuating && fluctuating_from.is_none() {
            fluctuating_from = Some(pass);
        }
        assert!(!id.devices[0].fluctuating);
    }

    assert_eq!(fluctuating_from, Some(5));
    let alerts = h.alerts.all();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].message.contains("Bulb 12W"));
    assert!(h.monitor.debouncer().snapshot(1).unwrap().alerted());
}

#[tokio::test]
async fn test_latch_reset_allows_second_alert() {
    let mut script: Vec<Vec<i32>> = (0..6).map(|i| vec![0, i % 2, 0]).collect();
    script.extend((0..10).map(|_| vec![0, 1, 0]));
    script.extend((0..6).map(|i| vec![0, i % 2, 0]));
    let debounce = DebounceConfig {
        latch_reset_after: Some(5),
        ..DebounceConfig::default()
    };
    let h = harness(FakeClassifier::scripted(script), debounce);
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 7));

    for _ in 0..22 {
        h.monitor.identify_at(&window, now, Utc::now()).await.unwrap();
    }

    assert_eq!(h.alerts.all().len(), 2);
}

#[tokio::test]
async fn test_store_failures_do_not_stop_the_latch() {
    let classifier = Arc::new(FakeClassifier::scripted(
        (0..8).map(|i| vec![i % 2, 0, 0]).collect(),
    ));
    let recorder = Arc::new(RecordingStatusStore::default());
    let alerts = Arc::new(FailingAlerts::default());
    let monitor = build_monitor(
        DebounceConfig::default(),
        Collaborators {
            classifier: classifier.clone(),
            anomaly: Arc::new(FakeAnomaly::new(1, None)),
            telemetry: Arc::new(FakeTelemetry::default()),
            status_stores: vec![
                Arc::new(FailingStatusStore) as Arc<dyn DeviceStatusStore>,
                recorder.clone(),
            ],
            alerts: alerts.clone(),
        },
    );
    let now = now_local();
    let window = Window::new(steady_window(34.0, now, 7));

    let mut raised = 0;
    for _ in 0..8 {
        let id = monitor.identify_at(&window, now, Utc::now()).await.unwrap();
        raised += id.devices.iter().filter(|d| d.alert_raised).count();
    }

    assert_eq!(raised, 1);
    assert_eq!(alerts.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.updates().len(), 8 * 3);
    assert!(monitor.debouncer().snapshot(0).unwrap().alerted());
}

#[tokio::test]
async fn test_anomaly_path_uses_current_reading_only() {
    let h = harness(FakeClassifier::always(vec![0, 0, 0]), DebounceConfig::default());
    let now = now_local();
    let mut readings = steady_window(100.0, now, 19);
    readings.push(reading_at(105.0, now, 0));
    let window = Window::new(readings);

    let outcome = h.monitor.detect_anomaly_at(&window, now).await.unwrap();

    let AnomalyOutcome::Evaluated(report) = outcome else {
        panic!("expected an evaluated outcome");
    };
    assert!(!report.is_anomaly);
    assert_eq!(report.anomaly_score, 0.0);
    assert_eq!(report.features.power_delta, 5.0);
    let seen = h.anomaly.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0][0], 230.0);
    assert_eq!(seen[0][2], 105.0);
    assert_eq!(seen[0][3], report.features.hour_of_day as f64);
    assert_eq!(h.classifier.calls(), 0);
}

#[tokio::test]
async fn test_anomalous_label_surfaces_score() {
    let anomaly = Arc::new(FakeAnomaly::new(-1, Some(-0.31)));
    let monitor = build_monitor(
        DebounceConfig::default(),
        Collaborators {
            classifier: Arc::new(FakeClassifier::always(vec![0, 0, 0])),
            anomaly,
            telemetry: Arc::new(FakeTelemetry::default()),
            status_stores: Vec::new(),
            alerts: Arc::new(FakeAlerts::default()),
        },
    );
    let now = now_local();
    let window = Window::new(vec![reading_at(900.0, now, 0)]);

    let outcome = monitor.detect_anomaly_at(&window, now).await.unwrap();

    let AnomalyOutcome::Evaluated(report) = outcome else {
        panic!("expected an evaluated outcome");
    };
    assert!(report.is_anomaly);
    assert_eq!(report.anomaly_score, -0.31);
    assert_eq!(report.prediction, -1);
    assert_eq!(report.features.power_rolling_std, 0.0);
}

#[tokio::test]
async fn test_watchdog_marks_devices_offline_through_monitor() {
    let h = harness(FakeClassifier::always(vec![1, 1, 1]), DebounceConfig::default());
    let now = now_local();
    h.monitor
        .identify_at(&Window::new(steady_window(40.0, now, 7)), now, Utc::now())
        .await
        .unwrap();
    assert!(h.memory.snapshot().iter().all(|d| d.is_active));

    let started = Utc::now();
    let heartbeat = Arc::new(Heartbeat::new("meter-1", Duration::seconds(20), started));
    let watchdog = Watchdog::new(
        heartbeat,
        h.monitor.clone(),
        std::time::Duration::from_secs(10),
    );

    assert!(!watchdog.check_at(started + Duration::seconds(15)).await);
    assert!(watchdog.check_at(started + Duration::seconds(25)).await);
    assert!(!watchdog.check_at(started + Duration::seconds(35)).await);

    let devices = h.memory.snapshot();
    assert!(devices.iter().all(|d| !d.is_active && d.status == "OFF"));
    // 3 from identification, 3 from the single offline transition
    assert_eq!(h.recorder.updates().len(), 6);
}
