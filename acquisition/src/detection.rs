//! Detector verdicts and the annotated readings kept in history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::Threshold;
use crate::reading::{ReadingPayload, SensorReading};

/// Stand-in confidence for the LSTM autoencoder, which reports none.
pub const LSTM_PLACEHOLDER_CONFIDENCE: f64 = 0.85;
/// Stand-in confidence for the battery spoofing model, which reports none.
pub const BATTERY_PLACEHOLDER_CONFIDENCE: f64 = 0.90;

/// Score above which a detection is banded `High`.
const HIGH_SEVERITY_SCORE: f64 = 80.0;
/// Score above which a detection is banded `Medium`.
const MEDIUM_SEVERITY_SCORE: f64 = 60.0;

/// Where a detection's confidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    /// Reported by the detector itself.
    Native,
    /// Fixed stand-in for a detector that reports no confidence.
    // TODO: replace with a calibrated estimate once the sequence detectors expose one.
    Placeholder,
}

/// Contribution of one channel to an anomaly score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// Channel name as reported by the detector.
    pub feature: String,
    pub value: f64,
    /// Share of the score, in percent. Contributions sum to roughly 100.
    pub contribution: f64,
    pub z_score: f64,
}

/// Result of classifying a reading (or a sequence of readings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Unbounded; higher is more anomalous.
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub confidence_source: ConfidenceSource,
    /// Ordered highest contributor first, when the detector explains itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Vec<FeatureAttribution>>,
}

impl Detection {
    /// A detection whose confidence was reported by the model. Confidence is
    /// clamped to `[0, 1]`.
    pub fn native(anomaly_score: f64, is_anomaly: bool, confidence: f64) -> Self {
        Self {
            anomaly_score,
            is_anomaly,
            confidence: clamp_unit(confidence),
            confidence_source: ConfidenceSource::Native,
            attribution: None,
        }
    }

    /// A detection carrying a fixed placeholder confidence.
    pub fn placeholder(anomaly_score: f64, is_anomaly: bool, confidence: f64) -> Self {
        Self {
            confidence_source: ConfidenceSource::Placeholder,
            ..Self::native(anomaly_score, is_anomaly, confidence)
        }
    }

    pub fn with_attribution(mut self, attribution: Vec<FeatureAttribution>) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn severity(&self) -> Severity {
        Severity::from_score(self.anomaly_score)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Coarse banding of an anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_SEVERITY_SCORE {
            Self::High
        } else if score > MEDIUM_SEVERITY_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A reading merged with its detection, as committed to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedReading {
    /// Commit order within the session, starting at 1.
    pub sequence: u64,
    pub reading: SensorReading,
    pub detection: Detection,
    /// Commit time (not acquisition time).
    pub timestamp: DateTime<Utc>,
}

impl AnnotatedReading {
    pub fn is_anomaly(&self) -> bool {
        self.detection.is_anomaly
    }

    /// Whether the score sits above the advisory threshold line. Purely
    /// informational: it never changes `is_anomaly`.
    pub fn exceeds(&self, threshold: Threshold) -> bool {
        self.detection.anomaly_score > f64::from(threshold.value())
    }

    /// Detector payload stamped with the commit time.
    pub fn payload(&self) -> ReadingPayload {
        ReadingPayload::at(&self.reading, unix_seconds(self.timestamp))
    }
}

pub(crate) fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
