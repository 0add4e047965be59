//! Bounded History Store
//!
//! The single source of truth for a monitoring session: two FIFO buffers
//! (readings and confirmed anomalies), the advisory threshold, the streaming
//! flag and the current anomaly selection.
//!
//! State is only mutated through the action methods on [`HistoryStore`];
//! each action runs under one write lock, so readers always see a whole
//! buffer, never one caught between an eviction and an append.
//!
//! ```text
//! add_reading ──► readings  (cap 50, oldest evicted)
//!      │
//!      └─ is_anomaly ──► anomalies (cap 30, evicted independently)
//! ```
//!
//! The store is created fresh per session and never persisted.

pub mod buffer;
pub mod events;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::detection::{AnnotatedReading, Detection};
use crate::reading::SensorReading;

pub use buffer::BoundedBuffer;
pub use events::{EventBus, HistoryEvent};

/// Readings kept before the oldest is evicted.
pub const READING_CAPACITY: usize = 50;
/// Anomalies kept before the oldest is evicted.
pub const ANOMALY_CAPACITY: usize = 30;
/// Threshold a new session starts with.
pub const DEFAULT_THRESHOLD: u8 = 60;

/// Error type for history operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Threshold {0} outside 0..=100")]
    ThresholdOutOfRange(u32),

    #[error("Reading #{0} is not an anomaly and cannot be selected")]
    NotAnomalous(u64),
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Shared reference to HistoryStore
pub type SharedHistoryStore = Arc<HistoryStore>;

/// Advisory anomaly threshold in `[0, 100]`.
///
/// Presentation draws it as a reference line; changing it never
/// re-classifies readings already in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u8")]
pub struct Threshold(u8);

impl Threshold {
    pub const MAX: u8 = 100;

    pub fn new(value: u32) -> HistoryResult<Self> {
        if value > u32::from(Self::MAX) {
            return Err(HistoryError::ThresholdOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<u32> for Threshold {
    type Error = HistoryError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for u8 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

/// Capacities and initial threshold for a new store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    pub reading_capacity: usize,
    pub anomaly_capacity: usize,
    pub threshold: Threshold,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            reading_capacity: READING_CAPACITY,
            anomaly_capacity: ANOMALY_CAPACITY,
            threshold: Threshold::default(),
        }
    }
}

#[derive(Debug)]
struct HistoryState {
    readings: BoundedBuffer<AnnotatedReading>,
    anomalies: BoundedBuffer<AnnotatedReading>,
    threshold: Threshold,
    selected_anomaly: Option<AnnotatedReading>,
    is_streaming: bool,
    next_sequence: u64,
}

/// Consistent copy of the whole store at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    /// Oldest first.
    pub readings: Vec<AnnotatedReading>,
    /// Oldest first.
    pub anomalies: Vec<AnnotatedReading>,
    pub threshold: Threshold,
    pub selected_anomaly: Option<AnnotatedReading>,
    pub is_streaming: bool,
}

/// In-memory session state with a narrow action interface.
#[derive(Debug)]
pub struct HistoryStore {
    state: RwLock<HistoryState>,
    events: EventBus,
    streaming: watch::Sender<bool>,
}

impl HistoryStore {
    /// Empty store with the default capacities and threshold 60.
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            state: RwLock::new(HistoryState {
                readings: BoundedBuffer::new(config.reading_capacity),
                anomalies: BoundedBuffer::new(config.anomaly_capacity),
                threshold: config.threshold,
                selected_anomaly: None,
                is_streaming: false,
                next_sequence: 1,
            }),
            events: EventBus::new(),
            streaming: watch::channel(false).0,
        }
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedHistoryStore {
        Arc::new(self)
    }

    // Every mutation is a single assignment or push under the guard, so a
    // poisoned lock still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HistoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Commit a classified reading, stamped with the current time.
    ///
    /// Always appended to `readings`; also appended to `anomalies` when
    /// `detection.is_anomaly`. Each buffer evicts its own oldest entry.
    pub fn add_reading(&self, reading: SensorReading, detection: Detection) -> AnnotatedReading {
        let mut state = self.write();
        let record = AnnotatedReading {
            sequence: state.next_sequence,
            reading,
            detection,
            timestamp: Utc::now(),
        };
        state.next_sequence += 1;

        if record.is_anomaly() {
            state.anomalies.push(record.clone());
        }
        state.readings.push(record.clone());

        debug!(
            sequence = record.sequence,
            anomaly = record.is_anomaly(),
            score = record.detection.anomaly_score,
            "reading committed"
        );
        // Published under the guard so events arrive in sequence order.
        self.events.publish(HistoryEvent::ReadingAdded {
            sequence: record.sequence,
            is_anomaly: record.is_anomaly(),
            anomaly_score: record.detection.anomaly_score,
            timestamp: record.timestamp,
        });
        record
    }

    /// Replace the advisory threshold. History is not re-evaluated.
    pub fn set_threshold(&self, threshold: Threshold) {
        self.write().threshold = threshold;
        self.events.publish(HistoryEvent::ThresholdChanged {
            threshold: threshold.value(),
        });
    }

    /// Toggle the streaming flag, returning the previous value.
    ///
    /// This is the only switch for acquisition: schedulers watch the flag
    /// (see [`HistoryStore::watch_streaming`]) and start or stop on each
    /// transition.
    pub fn set_streaming(&self, streaming: bool) -> bool {
        let mut state = self.write();
        let previous = std::mem::replace(&mut state.is_streaming, streaming);
        if previous != streaming {
            self.streaming.send_replace(streaming);
            self.events
                .publish(HistoryEvent::StreamingChanged { streaming });
        }
        previous
    }

    /// Empty both buffers. Threshold, streaming flag and selection are kept.
    pub fn clear_history(&self) {
        let (readings, anomalies) = {
            let mut state = self.write();
            let counts = (state.readings.len(), state.anomalies.len());
            state.readings.clear();
            state.anomalies.clear();
            counts
        };
        self.events
            .publish(HistoryEvent::HistoryCleared { readings, anomalies });
    }

    /// Select an anomaly for explanation, replacing any prior selection.
    ///
    /// The store keeps its own copy, so the selection outlives eviction of
    /// the record from either buffer. Non-anomalous records are rejected and
    /// leave the current selection untouched.
    pub fn select_anomaly(&self, record: AnnotatedReading) -> HistoryResult<()> {
        if !record.is_anomaly() {
            return Err(HistoryError::NotAnomalous(record.sequence));
        }
        let sequence = record.sequence;
        self.write().selected_anomaly = Some(record);
        self.events.publish(HistoryEvent::SelectionChanged {
            sequence: Some(sequence),
        });
        Ok(())
    }

    /// Clear the selection, returning what was selected.
    pub fn clear_selection(&self) -> Option<AnnotatedReading> {
        let previous = self.write().selected_anomaly.take();
        if previous.is_some() {
            self.events
                .publish(HistoryEvent::SelectionChanged { sequence: None });
        }
        previous
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.read();
        HistorySnapshot {
            readings: state.readings.to_vec(),
            anomalies: state.anomalies.to_vec(),
            threshold: state.threshold,
            selected_anomaly: state.selected_anomaly.clone(),
            is_streaming: state.is_streaming,
        }
    }

    pub fn readings(&self) -> Vec<AnnotatedReading> {
        self.read().readings.to_vec()
    }

    pub fn anomalies(&self) -> Vec<AnnotatedReading> {
        self.read().anomalies.to_vec()
    }

    /// The newest `n` readings, oldest first.
    pub fn recent_readings(&self, n: usize) -> Vec<AnnotatedReading> {
        self.read().readings.tail(n)
    }

    pub fn latest_reading(&self) -> Option<AnnotatedReading> {
        self.read().readings.last().cloned()
    }

    pub fn reading_count(&self) -> usize {
        self.read().readings.len()
    }

    pub fn anomaly_count(&self) -> usize {
        self.read().anomalies.len()
    }

    pub fn threshold(&self) -> Threshold {
        self.read().threshold
    }

    pub fn is_streaming(&self) -> bool {
        self.read().is_streaming
    }

    pub fn selected_anomaly(&self) -> Option<AnnotatedReading> {
        self.read().selected_anomaly.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Receiver tracking the streaming flag, starting at its current value.
    pub fn watch_streaming(&self) -> watch::Receiver<bool> {
        self.streaming.subscribe()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
