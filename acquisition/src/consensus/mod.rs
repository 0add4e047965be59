//! Consensus Orchestrator
//!
//! Fans the newest window of history out to all three detectors at once and
//! folds their verdicts into a [`ConsensusResult`].
//!
//! ```text
//!                 recent 10 readings
//!                        │
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//!   SVM (latest)   LSTM (sequence)   Battery (sequence)
//!        └───────────────┼────────────────┘
//!                        ▼
//!               join all, then vote
//! ```
//!
//! The join waits for every call: a failure in one model does not cut the
//! others short, but any failure fails the whole run and no partial result
//! is produced. There is no timeout; a hung detector holds the run open.

pub mod verdict;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::gateway::{GatewayError, GatewayResult, SharedGateway, SEQUENCE_LEN};
use crate::history::SharedHistoryStore;
use crate::reading::ReadingPayload;

pub use verdict::{tally, ComparisonWindow, ConsensusResult, ModelKind, ModelVerdict, MODEL_COUNT};

/// Readings a comparison needs, and uses.
pub const COMPARISON_WINDOW: usize = SEQUENCE_LEN;

/// Error type for consensus operations
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Need at least {need} readings to compare models, have {have}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Comparison failed: {model} detector: {source}")]
    ComparisonFailed {
        model: ModelKind,
        #[source]
        source: GatewayError,
    },
}

impl ConsensusError {
    /// Caller-correctable; nothing was sent to the backend.
    pub fn is_precondition(&self) -> bool {
        match self {
            Self::InsufficientHistory { .. } => true,
            Self::ComparisonFailed { source, .. } => source.is_precondition(),
        }
    }
}

/// Result type for consensus operations
pub type CompareResult<T> = Result<T, ConsensusError>;

/// Runs on-demand multi-model comparisons over the history store.
#[derive(Clone)]
pub struct ConsensusOrchestrator {
    store: SharedHistoryStore,
    gateway: SharedGateway,
}

impl ConsensusOrchestrator {
    pub fn new(store: SharedHistoryStore, gateway: SharedGateway) -> Self {
        Self { store, gateway }
    }

    /// Compare all three detectors on the newest [`COMPARISON_WINDOW`]
    /// readings.
    ///
    /// # Errors
    ///
    /// - [`ConsensusError::InsufficientHistory`] when history is too short;
    ///   checked before any call is issued.
    /// - [`ConsensusError::ComparisonFailed`] when any detector call fails.
    pub async fn compare(&self) -> CompareResult<ConsensusResult> {
        let window = self.store.recent_readings(COMPARISON_WINDOW);
        let (first, latest) = match (window.first(), window.last()) {
            (Some(first), Some(latest)) if window.len() == COMPARISON_WINDOW => (first, latest),
            _ => {
                return Err(ConsensusError::InsufficientHistory {
                    have: window.len(),
                    need: COMPARISON_WINDOW,
                })
            }
        };
        let span = ComparisonWindow {
            first_sequence: first.sequence,
            last_sequence: latest.sequence,
            len: window.len(),
        };

        let latest_payload = latest.payload();
        let sequence: Vec<ReadingPayload> = window.iter().map(|r| r.payload()).collect();

        info!(
            first = span.first_sequence,
            last = span.last_sequence,
            "starting model comparison"
        );

        let gateway = &self.gateway;
        let (svm, lstm, battery) = tokio::join!(
            timed(gateway.classify_svm(&latest_payload)),
            timed(gateway.classify_lstm(&sequence)),
            timed(gateway.classify_battery_spoofing(&sequence)),
        );

        for (model, err) in [
            (ModelKind::Svm, svm.0.as_ref().err()),
            (ModelKind::Lstm, lstm.0.as_ref().err()),
            (ModelKind::Battery, battery.0.as_ref().err()),
        ] {
            if let Some(e) = err {
                warn!(model = %model, error = %e, "detector call failed");
            }
        }

        let failed = |model: ModelKind| {
            move |source: GatewayError| ConsensusError::ComparisonFailed { model, source }
        };
        let svm_detection = svm.0.map_err(failed(ModelKind::Svm))?;
        let lstm_detection = lstm.0.map_err(failed(ModelKind::Lstm))?;
        let spoofing = battery.0.map_err(failed(ModelKind::Battery))?;

        let result = ConsensusResult::new(
            vec![
                ModelVerdict::svm(&svm_detection, svm.1),
                ModelVerdict::lstm(&lstm_detection, lstm.1),
                ModelVerdict::battery(&spoofing, battery.1),
            ],
            span,
        );

        info!(
            event = "model_comparison_run",
            svm_score = svm_detection.anomaly_score,
            lstm_score = lstm_detection.anomaly_score,
            battery_score = spoofing.anomaly_score,
            svm_anomaly = svm_detection.is_anomaly,
            lstm_anomaly = lstm_detection.is_anomaly,
            battery_anomaly = spoofing.is_spoofed,
            votes = result.anomaly_votes,
            agreement = result.agreement,
            "model comparison complete"
        );

        Ok(result)
    }
}

async fn timed<T>(call: impl Future<Output = GatewayResult<T>>) -> (GatewayResult<T>, Duration) {
    let start = Instant::now();
    let result = call.await;
    (result, start.elapsed())
}
