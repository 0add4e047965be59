//! In-process detection backend for session tests.

#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acquisition::gateway::{check_sequence, ModelAvailability};
use acquisition::reading::SampleTime;
use acquisition::{
    AttackKind, AttackSample, Detection, DetectionGateway, FeatureAttribution, GatewayError,
    GatewayResult, HealthStatus, RawSample, ReadingPayload, SpoofingVerdict,
};
use async_trait::async_trait;
use sensor_monitor::MonitorConfig;

/// Dataset row `index`, with a textual datetime and voltage = index.
pub fn sample(index: usize) -> RawSample {
    RawSample {
        datetime: SampleTime::Text(format!("2024-05-01 10:{:02}:{:02}", index / 60, index % 60)),
        accelerometer1_rms: Some(0.2),
        accelerometer2_rms: Some(0.3),
        current: Some(1.5),
        pressure: Some(0.1),
        temperature: Some(70.0),
        thermocouple: Some(25.0),
        voltage: Some(index as f64),
        volume_flow_rate_rms: Some(32.0),
        tag: None,
        attack: None,
    }
}

const FEATURES: [&str; 6] = [
    "voltage",
    "current",
    "pressure",
    "temperature",
    "thermocouple",
    "Accelerometer1RMS",
];

/// Flags every `anomaly_every`-th reading (by voltage) as an SVM anomaly.
pub struct FakeBackend {
    pub fetches: AtomicUsize,
    pub svm_calls: AtomicUsize,
    pub sequence_calls: AtomicUsize,
    pub anomaly_every: usize,
    pub lstm_anomaly: AtomicBool,
    pub battery_anomaly: AtomicBool,
    pub battery_down: AtomicBool,
    pub latency: Duration,
}

impl FakeBackend {
    pub fn new(anomaly_every: usize) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            svm_calls: AtomicUsize::new(0),
            sequence_calls: AtomicUsize::new(0),
            anomaly_every,
            lstm_anomaly: AtomicBool::new(false),
            battery_anomaly: AtomicBool::new(false),
            battery_down: AtomicBool::new(false),
            latency: Duration::from_millis(20),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl DetectionGateway for FakeBackend {
    async fn health(&self) -> GatewayResult<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".into(),
            models: Some(ModelAvailability {
                svm: true,
                lstm: true,
                battery: !self.battery_down.load(Ordering::SeqCst),
            }),
        })
    }

    async fn fetch_samples(&self, n: NonZeroUsize) -> GatewayResult<Vec<RawSample>> {
        let start = self.fetches.fetch_add(n.get(), Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok((start..start + n.get()).map(sample).collect())
    }

    async fn classify_svm(&self, reading: &ReadingPayload) -> GatewayResult<Detection> {
        self.svm_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let index = reading.voltage as usize;
        if self.anomaly_every > 0 && index % self.anomaly_every == self.anomaly_every - 1 {
            let attribution = FEATURES
                .iter()
                .zip([48.0, 21.0, 12.0, 9.0, 6.0, 4.0])
                .map(|(feature, contribution)| FeatureAttribution {
                    feature: feature.to_string(),
                    value: reading.voltage,
                    contribution,
                    z_score: contribution / 10.0,
                })
                .collect();
            Ok(Detection::native(-91.0, true, 0.93).with_attribution(attribution))
        } else {
            Ok(Detection::native(8.0, false, 0.6))
        }
    }

    async fn classify_lstm(&self, sequence: &[ReadingPayload]) -> GatewayResult<Detection> {
        check_sequence(sequence)?;
        self.sequence_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(Detection::placeholder(
            0.27,
            self.lstm_anomaly.load(Ordering::SeqCst),
            0.85,
        ))
    }

    async fn classify_battery_spoofing(
        &self,
        sequence: &[ReadingPayload],
    ) -> GatewayResult<SpoofingVerdict> {
        check_sequence(sequence)?;
        self.sequence_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.battery_down.load(Ordering::SeqCst) {
            return Err(GatewayError::RemoteUnavailable("battery model not loaded".into()));
        }
        Ok(SpoofingVerdict {
            is_spoofed: self.battery_anomaly.load(Ordering::SeqCst),
            anomaly_score: 0.55,
        })
    }

    async fn generate_attack_samples(
        &self,
        kind: AttackKind,
        count: NonZeroUsize,
    ) -> GatewayResult<Vec<AttackSample>> {
        Ok((0..count.get())
            .map(|i| {
                let mut sample = sample(i);
                sample.voltage = Some(500.0);
                sample.attack = Some(kind.label().to_string());
                AttackSample { kind, sample }
            })
            .collect())
    }
}

/// Fast cadence so tests run in a few simulated seconds.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        interval_ms: 100,
        ..MonitorConfig::default()
    }
}
