//! Detection Gateway: typed request/response boundary to the remote
//! detectors and the sample-data provider.
//!
//! Every call is a single attempt. Transport failures surface as
//! [`GatewayError::RemoteUnavailable`], schema mismatches as
//! [`GatewayError::InvalidResponse`]; nothing here retries.
//!
//! | Operation                   | Endpoint                          |
//! |-----------------------------|-----------------------------------|
//! | `health`                    | `GET /api/health`                 |
//! | `fetch_samples`             | `GET /api/data/sample?n={n}`      |
//! | `generate_attack_samples`   | `POST /api/attacks/generate`      |
//! | `classify_svm`              | `POST /api/anomaly/detect-svm`    |
//! | `classify_lstm`             | `POST /api/anomaly/detect-lstm`   |
//! | `classify_battery_spoofing` | `POST /api/battery/detect`        |

pub mod http;
pub mod wire;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::reading::{RawSample, ReadingPayload};

pub use http::HttpGateway;

/// Exact sequence length the LSTM and battery detectors accept.
pub const SEQUENCE_LEN: usize = 10;

/// Error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Sequence must hold exactly {need} readings, got {got}")]
    InsufficientSequence { got: usize, need: usize },
}

impl GatewayError {
    /// Caller-correctable failure detected before any request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InsufficientSequence { .. })
    }

    pub(crate) fn invalid(endpoint: &'static str, reason: impl fmt::Display) -> Self {
        Self::InvalidResponse {
            endpoint,
            reason: reason.to_string(),
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Shared reference to a gateway implementation
pub type SharedGateway = Arc<dyn DetectionGateway>;

/// Reject a detector sequence of the wrong length without touching the network.
pub fn check_sequence(sequence: &[ReadingPayload]) -> GatewayResult<()> {
    if sequence.len() != SEQUENCE_LEN {
        return Err(GatewayError::InsufficientSequence {
            got: sequence.len(),
            need: SEQUENCE_LEN,
        });
    }
    Ok(())
}

/// Synthetic attack families the backend can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackKind {
    Fuzzy,
    Spoofing,
    Replay,
    Dos,
}

impl AttackKind {
    pub const ALL: [AttackKind; 4] = [Self::Fuzzy, Self::Spoofing, Self::Replay, Self::Dos];

    /// Request value for `attack_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fuzzy => "fuzzy",
            Self::Spoofing => "spoofing",
            Self::Replay => "replay",
            Self::Dos => "dos",
        }
    }

    /// Label the generator writes into each sample's `Attack` field.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fuzzy => "Fuzzy",
            Self::Spoofing => "Spoofing",
            Self::Replay => "Replay",
            Self::Dos => "DoS",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown attack type '{s}' (fuzzy|spoofing|replay|dos)"))
    }
}

/// A generated sample tagged with the attack type that was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackSample {
    pub kind: AttackKind,
    pub sample: RawSample,
}

/// Battery voltage spoofing verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpoofingVerdict {
    pub is_spoofed: bool,
    pub anomaly_score: f64,
}

/// Which detectors the backend has loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAvailability {
    #[serde(default)]
    pub svm: bool,
    #[serde(default)]
    pub lstm: bool,
    #[serde(default)]
    pub battery: bool,
}

/// Backend health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub models: Option<ModelAvailability>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "online"
    }
}

/// Remote detectors and sample provider.
///
/// `classify_lstm` and `classify_battery_spoofing` must fail with
/// [`GatewayError::InsufficientSequence`] before any I/O when the sequence is
/// not exactly [`SEQUENCE_LEN`] long; implementations call [`check_sequence`].
#[async_trait]
pub trait DetectionGateway: Send + Sync {
    async fn health(&self) -> GatewayResult<HealthStatus>;

    /// Fetch `n` random samples from the backend dataset, in served order.
    async fn fetch_samples(&self, n: NonZeroUsize) -> GatewayResult<Vec<RawSample>>;

    /// Single-point One-Class SVM classification.
    async fn classify_svm(&self, reading: &ReadingPayload) -> GatewayResult<Detection>;

    /// Sequence classification. The score is the reconstruction error and the
    /// confidence is a placeholder.
    async fn classify_lstm(&self, sequence: &[ReadingPayload]) -> GatewayResult<Detection>;

    async fn classify_battery_spoofing(
        &self,
        sequence: &[ReadingPayload],
    ) -> GatewayResult<SpoofingVerdict>;

    async fn generate_attack_samples(
        &self,
        kind: AttackKind,
        count: NonZeroUsize,
    ) -> GatewayResult<Vec<AttackSample>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sequence_length() {
        let payload = ReadingPayload {
            datetime: 0.0,
            accelerometer1_rms: 0.0,
            accelerometer2_rms: 0.0,
            current: 0.0,
            pressure: 0.0,
            temperature: 0.0,
            thermocouple: 0.0,
            voltage: 0.0,
            volume_flow_rate_rms: 0.0,
        };
        assert!(check_sequence(&[payload; SEQUENCE_LEN]).is_ok());

        let err = check_sequence(&[payload; 9]).unwrap_err();
        assert!(err.is_precondition());
        assert!(matches!(
            err,
            GatewayError::InsufficientSequence { got: 9, need: 10 }
        ));
        assert!(check_sequence(&[payload; 11]).is_err());
    }

    #[test]
    fn test_attack_kind_parsing() {
        assert_eq!("DoS".parse::<AttackKind>().unwrap(), AttackKind::Dos);
        assert_eq!("fuzzy".parse::<AttackKind>().unwrap(), AttackKind::Fuzzy);
        assert!("ransomware".parse::<AttackKind>().is_err());
        assert_eq!(
            serde_json::to_value(AttackKind::Spoofing).unwrap(),
            "spoofing"
        );
    }
}
