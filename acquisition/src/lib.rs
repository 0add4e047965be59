//! Sensor Stream Acquisition Library
//!
//! Streaming acquisition and multi-model consensus core for an
//! anomaly-detection monitor.
//!
//! # Components
//!
//! - [`gateway`]: typed boundary to the remote detectors (SVM, LSTM, battery
//!   spoofing) and the sample provider
//! - [`history`]: bounded reading/anomaly buffers, advisory threshold,
//!   selection and streaming flag
//! - [`scheduler`]: cancellable periodic acquire-and-classify cycles
//! - [`consensus`]: parallel three-model comparison with unanimous voting
//! - [`selection`]: select/clear over one anomaly, plus its explanation
//!
//! # Data flow
//!
//! ```text
//! Scheduler ──▶ Gateway ──▶ HistoryStore ──▶ readers (stats, reports, events)
//!                                 │
//! Orchestrator ◀──────────────────┘
//!      └──▶ Gateway ×3 (parallel) ──▶ ConsensusResult
//! ```

pub mod attack;
pub mod consensus;
pub mod detection;
pub mod gateway;
pub mod health;
pub mod history;
pub mod reading;
pub mod scheduler;
pub mod selection;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use attack::{AttackComparison, AttackReport, ChannelContrast};
pub use consensus::{
    CompareResult, ComparisonWindow, ConsensusError, ConsensusOrchestrator, ConsensusResult,
    ModelKind, ModelVerdict,
};
pub use detection::{
    AnnotatedReading, ConfidenceSource, Detection, FeatureAttribution, Severity,
};
pub use gateway::{
    AttackKind, AttackSample, DetectionGateway, GatewayError, GatewayResult, HealthStatus,
    HttpGateway, SharedGateway, SpoofingVerdict,
};
pub use health::{HealthLevel, StreamHealth};
pub use history::{
    HistoryConfig, HistoryError, HistoryEvent, HistorySnapshot, HistoryStore, SharedHistoryStore,
    Threshold,
};
pub use reading::{Channel, ChannelValues, RawSample, ReadingPayload, SensorReading};
pub use scheduler::StreamingScheduler;
pub use selection::{Explanation, ExplanationSelector};
pub use stats::HistoryStats;
