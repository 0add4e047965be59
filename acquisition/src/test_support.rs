//! Stub gateway shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::detection::Detection;
use crate::gateway::{
    check_sequence, AttackKind, AttackSample, DetectionGateway, GatewayError, GatewayResult,
    HealthStatus, ModelAvailability, SpoofingVerdict,
};
use crate::reading::{RawSample, ReadingPayload, SampleTime};

/// How a stubbed detector answers.
#[derive(Debug, Clone, Copy)]
pub enum Verdict {
    Normal,
    Anomaly,
    Fail,
}

/// Sample whose voltage encodes the fetch call that produced it.
pub fn sample(index: usize) -> RawSample {
    RawSample {
        datetime: SampleTime::Unix(1_700_000_000.0 + index as f64),
        accelerometer1_rms: Some(0.2),
        accelerometer2_rms: Some(0.3),
        current: Some(1.5),
        pressure: Some(0.1),
        temperature: Some(70.0),
        thermocouple: Some(25.0),
        voltage: Some(index as f64),
        volume_flow_rate_rms: None,
        tag: None,
        attack: None,
    }
}

/// Records calls and answers from a small script.
pub struct StubGateway {
    pub fetch_calls: AtomicUsize,
    pub svm_calls: AtomicUsize,
    pub lstm_calls: AtomicUsize,
    pub battery_calls: AtomicUsize,
    pub attack_calls: AtomicUsize,
    fetch_delays: Mutex<VecDeque<Duration>>,
    failing_fetches: HashSet<usize>,
    svm: Verdict,
    lstm: Verdict,
    battery: Verdict,
    detector_delay: Duration,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            fetch_calls: AtomicUsize::new(0),
            svm_calls: AtomicUsize::new(0),
            lstm_calls: AtomicUsize::new(0),
            battery_calls: AtomicUsize::new(0),
            attack_calls: AtomicUsize::new(0),
            fetch_delays: Mutex::new(VecDeque::new()),
            failing_fetches: HashSet::new(),
            svm: Verdict::Normal,
            lstm: Verdict::Normal,
            battery: Verdict::Normal,
            detector_delay: Duration::ZERO,
        }
    }

    /// Delay for the n-th fetch call; later calls are immediate.
    pub fn with_fetch_delays(self, delays: Vec<Duration>) -> Self {
        *self.fetch_delays.lock().unwrap() = delays.into();
        self
    }

    /// Make the fetch call with this zero-based index fail.
    pub fn failing_fetch(mut self, index: usize) -> Self {
        self.failing_fetches.insert(index);
        self
    }

    pub fn with_verdicts(mut self, svm: Verdict, lstm: Verdict, battery: Verdict) -> Self {
        self.svm = svm;
        self.lstm = lstm;
        self.battery = battery;
        self
    }

    pub fn with_detector_delay(mut self, delay: Duration) -> Self {
        self.detector_delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.fetch_calls,
            &self.svm_calls,
            &self.lstm_calls,
            &self.battery_calls,
            &self.attack_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    async fn answer(&self, verdict: Verdict, model: &str) -> GatewayResult<bool> {
        if !self.detector_delay.is_zero() {
            tokio::time::sleep(self.detector_delay).await;
        }
        match verdict {
            Verdict::Normal => Ok(false),
            Verdict::Anomaly => Ok(true),
            Verdict::Fail => Err(GatewayError::RemoteUnavailable(format!("{model} down"))),
        }
    }
}

#[async_trait]
impl DetectionGateway for StubGateway {
    async fn health(&self) -> GatewayResult<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".into(),
            models: Some(ModelAvailability {
                svm: true,
                lstm: true,
                battery: true,
            }),
        })
    }

    async fn fetch_samples(&self, n: NonZeroUsize) -> GatewayResult<Vec<RawSample>> {
        let index = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.fetch_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_fetches.contains(&index) {
            return Err(GatewayError::RemoteUnavailable("connection refused".into()));
        }
        Ok((0..n.get()).map(|i| sample(index + i)).collect())
    }

    async fn classify_svm(&self, reading: &ReadingPayload) -> GatewayResult<Detection> {
        self.svm_calls.fetch_add(1, Ordering::SeqCst);
        let is_anomaly = self.answer(self.svm, "svm").await?;
        let score = if is_anomaly { -72.0 } else { 12.0 + reading.voltage };
        Ok(Detection::native(score, is_anomaly, 0.72))
    }

    async fn classify_lstm(&self, sequence: &[ReadingPayload]) -> GatewayResult<Detection> {
        check_sequence(sequence)?;
        self.lstm_calls.fetch_add(1, Ordering::SeqCst);
        let is_anomaly = self.answer(self.lstm, "lstm").await?;
        Ok(Detection::placeholder(0.42, is_anomaly, 0.85))
    }

    async fn classify_battery_spoofing(
        &self,
        sequence: &[ReadingPayload],
    ) -> GatewayResult<SpoofingVerdict> {
        check_sequence(sequence)?;
        self.battery_calls.fetch_add(1, Ordering::SeqCst);
        let is_spoofed = self.answer(self.battery, "battery").await?;
        Ok(SpoofingVerdict {
            is_spoofed,
            anomaly_score: 0.3,
        })
    }

    async fn generate_attack_samples(
        &self,
        kind: AttackKind,
        count: NonZeroUsize,
    ) -> GatewayResult<Vec<AttackSample>> {
        self.attack_calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..count.get())
            .map(|i| {
                let mut sample = sample(100 + i);
                sample.attack = Some(kind.label().to_string());
                AttackSample { kind, sample }
            })
            .collect())
    }
}
