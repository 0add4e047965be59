//! Session-level tests: streaming, consensus and selection wired together
//! against an in-process backend.

mod common;

use std::num::NonZeroUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use acquisition::{AttackKind, Channel, ConsensusError, HealthLevel, HistoryEvent, ModelKind};
use common::{test_config, FakeBackend};
use sensor_monitor::MonitorSession;

fn session_with(backend: &std::sync::Arc<FakeBackend>) -> MonitorSession {
    MonitorSession::with_gateway(&test_config(), backend.clone()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn streaming_fills_history_in_order() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    assert!(!session.set_streaming(true));
    assert!(session.is_streaming());
    assert!(session.wait_for_readings(10, Duration::from_secs(5)).await);

    let voltages: Vec<f64> = session
        .snapshot()
        .readings
        .iter()
        .filter_map(|r| r.reading.value(Channel::Voltage))
        .collect();
    let expected: Vec<f64> = (0..10).map(|i| i as f64).collect();
    assert_eq!(&voltages[..10], expected.as_slice());

    assert!(session.set_streaming(false));
    assert!(!session.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn stopping_prevents_further_acquisition() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    tokio::time::sleep(Duration::from_millis(350)).await;
    session.set_streaming(false);

    // Let anything already dispatched land.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let fetches = backend.fetches.load(Ordering::SeqCst);
    let readings = session.store().reading_count();
    assert_eq!(fetches, 4);
    assert_eq!(readings, 4);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.fetches.load(Ordering::SeqCst), fetches);
    assert_eq!(session.store().reading_count(), readings);
    assert_eq!(session.stream_health().level, HealthLevel::Healthy);
}

#[tokio::test(start_paused = true)]
async fn store_flag_alone_drives_acquisition() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    // Turning the flag on through the store starts acquisition.
    assert!(!session.store().set_streaming(true));
    assert!(session.wait_for_readings(3, Duration::from_secs(5)).await);
    assert!(session.is_streaming());

    // Turning it off through the store stops it.
    session.store().set_streaming(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let fetches = backend.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.fetches.load(Ordering::SeqCst), fetches);
    assert!(!session.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn mixed_toggles_leave_flag_and_schedule_in_step() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.store().set_streaming(false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!session.is_streaming());
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn compare_requires_ten_readings() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(5, Duration::from_secs(5)).await);
    session.set_streaming(false);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let svm_before = backend.svm_calls.load(Ordering::SeqCst);
    let err = session.compare().await.unwrap_err();
    assert!(matches!(err, ConsensusError::InsufficientHistory { .. }));
    assert!(err.is_precondition());
    assert_eq!(backend.sequence_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.svm_calls.load(Ordering::SeqCst), svm_before);
}

#[tokio::test(start_paused = true)]
async fn compare_votes_across_models() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(10, Duration::from_secs(5)).await);
    session.set_streaming(false);

    let result = session.compare().await.unwrap();
    assert_eq!(result.anomaly_votes, 0);
    assert!(result.agreement);
    assert_eq!(result.window.len, 10);
    let confidence = |model| result.verdict(model).map(|v| v.confidence).unwrap();
    assert!((confidence(ModelKind::Lstm) - 85.0).abs() < 1e-9);
    assert!((confidence(ModelKind::Battery) - 90.0).abs() < 1e-9);

    backend.lstm_anomaly.store(true, Ordering::SeqCst);
    let result = session.compare().await.unwrap();
    assert_eq!(result.anomaly_votes, 1);
    assert!(result.is_conflicting());
}

#[tokio::test(start_paused = true)]
async fn compare_fails_when_one_model_is_down() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(10, Duration::from_secs(5)).await);
    session.set_streaming(false);

    backend.battery_down.store(true, Ordering::SeqCst);
    let err = session.compare().await.unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::ComparisonFailed {
            model: ModelKind::Battery,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn explanation_follows_selected_anomaly() {
    // Readings 2, 5, 8, ... are anomalous.
    let backend = FakeBackend::new(3).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(6, Duration::from_secs(5)).await);
    session.set_streaming(false);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.store().anomaly_count(), 2);
    let selected = session.select_latest_anomaly().unwrap();
    assert!(selected.is_anomaly());

    let explanation = session.explanation().unwrap();
    assert_eq!(explanation.sequence, selected.sequence);
    assert!((explanation.confidence - 93.0).abs() < 1e-9);
    let high: Vec<bool> = explanation.top.iter().map(|c| c.high).collect();
    assert_eq!(high, vec![true, true, false, false, false]);
    assert_eq!(explanation.remaining.len(), 1);

    // Clearing history leaves the selection alone.
    session.clear_history();
    assert_eq!(session.store().reading_count(), 0);
    assert_eq!(
        session.explanation().map(|e| e.sequence),
        Some(selected.sequence)
    );

    assert!(session.clear_selection().is_some());
    assert!(session.explanation().is_none());
}

#[tokio::test(start_paused = true)]
async fn normal_reading_cannot_be_selected() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(1, Duration::from_secs(5)).await);
    session.set_streaming(false);

    let normal = session.snapshot().readings[0].clone();
    assert!(session.select(normal).is_err());
    assert!(session.explanation().is_none());
    assert!(session.select_latest_anomaly().is_none());
}

#[tokio::test(start_paused = true)]
async fn events_report_streaming_and_readings() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);
    let mut events = session.subscribe();

    session.set_streaming(true);
    assert_eq!(
        events.recv().await.unwrap(),
        HistoryEvent::StreamingChanged { streaming: true }
    );
    match events.recv().await.unwrap() {
        HistoryEvent::ReadingAdded {
            sequence,
            is_anomaly,
            ..
        } => {
            assert_eq!(sequence, 1);
            assert!(!is_anomaly);
        }
        other => panic!("unexpected event {other:?}"),
    }
    session.set_streaming(false);
}

#[tokio::test(start_paused = true)]
async fn threshold_is_advisory() {
    let backend = FakeBackend::new(3).shared();
    let session = session_with(&backend);

    session.set_streaming(true);
    assert!(session.wait_for_readings(3, Duration::from_secs(5)).await);
    session.set_streaming(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = session.snapshot();

    assert!(session.set_threshold(101).is_err());
    session.set_threshold(5).unwrap();
    assert_eq!(session.store().threshold().value(), 5);

    let after = session.snapshot();
    assert_eq!(before.readings, after.readings);
    assert_eq!(before.anomalies, after.anomalies);

    let stats = session.stats().unwrap();
    assert_eq!(stats.total_readings, after.readings.len());
    assert_eq!(stats.anomaly_count, after.anomalies.len());
}

#[tokio::test]
async fn attack_comparison_through_session() {
    let backend = FakeBackend::new(3).shared();
    let session = session_with(&backend);

    let report = session
        .attack(AttackKind::Spoofing, NonZeroUsize::new(12).unwrap())
        .await
        .unwrap();
    assert_eq!(report.attack_samples, 12);
    assert_eq!(report.normal_samples, 12);
    assert_eq!(report.classified, 10);
    assert_eq!(report.detected, 10);
}

#[tokio::test]
async fn backend_health_is_reported() {
    let backend = FakeBackend::new(0).shared();
    let session = session_with(&backend);

    let health = session.backend_health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.models.map(|m| m.battery), Some(true));
}
