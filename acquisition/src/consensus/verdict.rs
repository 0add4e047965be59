//! Per-model verdict normalization and unanimous-agreement voting.
//!
//! The three detectors report on different scales: the SVM returns a signed
//! decision-function distance and a native confidence, the LSTM returns a
//! reconstruction error and the battery model a spoofing score. Each is
//! rescaled to a common 0–100-ish display range here.
//!
//! | Model   | Score          | Confidence         |
//! |---------|----------------|--------------------|
//! | SVM     | `|score|`      | native × 100       |
//! | LSTM    | `error × 100`  | 85 (placeholder)   |
//! | Battery | `score × 100`  | 90 (placeholder)   |

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detection::{
    ConfidenceSource, Detection, BATTERY_PLACEHOLDER_CONFIDENCE, LSTM_PLACEHOLDER_CONFIDENCE,
};
use crate::gateway::SpoofingVerdict;

/// Number of models taking part in every comparison.
pub const MODEL_COUNT: usize = 3;

/// The independent detectors compared by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Svm,
    Lstm,
    Battery,
}

impl ModelKind {
    pub const ALL: [ModelKind; MODEL_COUNT] = [Self::Svm, Self::Lstm, Self::Battery];

    pub fn label(self) -> &'static str {
        match self {
            Self::Svm => "SVM (Instant)",
            Self::Lstm => "LSTM (Temporal)",
            Self::Battery => "Battery (Specialized)",
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            Self::Svm => "Single-Point",
            Self::Lstm => "Sequential",
            Self::Battery => "Voltage-Focused",
        }
    }

    /// Advertised response time, shown next to the measured one.
    pub fn nominal_response_time(self) -> &'static str {
        match self {
            Self::Svm => "< 50ms",
            Self::Lstm => "~ 100ms",
            Self::Battery => "~ 80ms",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Svm => write!(f, "svm"),
            Self::Lstm => write!(f, "lstm"),
            Self::Battery => write!(f, "battery"),
        }
    }
}

/// One model's normalized verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVerdict {
    pub model: ModelKind,
    pub label: &'static str,
    pub is_anomaly: bool,
    /// Rescaled score for display.
    pub normalized_score: f64,
    /// Score as the detector reported it.
    pub raw_score: f64,
    /// Percent.
    pub confidence: f64,
    pub confidence_source: ConfidenceSource,
    pub method: &'static str,
    pub nominal_response_time: &'static str,
    /// Wall time of this model's call within the comparison.
    pub observed_latency: Duration,
}

impl ModelVerdict {
    fn new(
        model: ModelKind,
        is_anomaly: bool,
        raw_score: f64,
        normalized_score: f64,
        confidence: f64,
        confidence_source: ConfidenceSource,
        observed_latency: Duration,
    ) -> Self {
        Self {
            model,
            label: model.label(),
            is_anomaly,
            normalized_score,
            raw_score,
            confidence,
            confidence_source,
            method: model.method(),
            nominal_response_time: model.nominal_response_time(),
            observed_latency,
        }
    }

    pub fn svm(detection: &Detection, latency: Duration) -> Self {
        Self::new(
            ModelKind::Svm,
            detection.is_anomaly,
            detection.anomaly_score,
            detection.anomaly_score.abs(),
            detection.confidence * 100.0,
            detection.confidence_source,
            latency,
        )
    }

    /// The LSTM's score is its reconstruction error.
    pub fn lstm(detection: &Detection, latency: Duration) -> Self {
        Self::new(
            ModelKind::Lstm,
            detection.is_anomaly,
            detection.anomaly_score,
            detection.anomaly_score * 100.0,
            LSTM_PLACEHOLDER_CONFIDENCE * 100.0,
            ConfidenceSource::Placeholder,
            latency,
        )
    }

    pub fn battery(verdict: &SpoofingVerdict, latency: Duration) -> Self {
        Self::new(
            ModelKind::Battery,
            verdict.is_spoofed,
            verdict.anomaly_score,
            verdict.anomaly_score * 100.0,
            BATTERY_PLACEHOLDER_CONFIDENCE * 100.0,
            ConfidenceSource::Placeholder,
            latency,
        )
    }
}

/// Vote count and agreement over a set of verdicts.
///
/// Agreement is only declared when the models are unanimous: no votes, or a
/// vote from every model.
pub fn tally(verdicts: &[ModelVerdict]) -> (usize, bool) {
    let votes = verdicts.iter().filter(|v| v.is_anomaly).count();
    (votes, votes == 0 || votes == verdicts.len())
}

/// Readings a comparison ran over, by commit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonWindow {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub len: usize,
}

/// Outcome of one comparison run. Ephemeral: the next run supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusResult {
    /// SVM, LSTM, battery, in that order.
    pub verdicts: Vec<ModelVerdict>,
    /// Models flagging an anomaly, `0..=3`.
    pub anomaly_votes: usize,
    pub agreement: bool,
    pub window: ComparisonWindow,
    pub completed_at: DateTime<Utc>,
}

impl ConsensusResult {
    pub fn new(verdicts: Vec<ModelVerdict>, window: ComparisonWindow) -> Self {
        let (anomaly_votes, agreement) = tally(&verdicts);
        Self {
            verdicts,
            anomaly_votes,
            agreement,
            window,
            completed_at: Utc::now(),
        }
    }

    pub fn is_conflicting(&self) -> bool {
        !self.agreement
    }

    /// Unanimous anomaly verdict.
    pub fn is_confirmed_anomaly(&self) -> bool {
        self.agreement && self.anomaly_votes == self.verdicts.len()
    }

    pub fn verdict(&self, model: ModelKind) -> Option<&ModelVerdict> {
        self.verdicts.iter().find(|v| v.model == model)
    }
}
