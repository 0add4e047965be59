//! Change notifications for history consumers
//!
//! Pub/sub over a Tokio broadcast channel. Subscribers that fall behind
//! lose the oldest events (`RecvError::Lagged`); the store never blocks on
//! a slow reader.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// A mutation applied to the history store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    ReadingAdded {
        sequence: u64,
        is_anomaly: bool,
        anomaly_score: f64,
        timestamp: DateTime<Utc>,
    },
    ThresholdChanged {
        threshold: u8,
    },
    StreamingChanged {
        streaming: bool,
    },
    HistoryCleared {
        readings: usize,
        anomalies: usize,
    },
    SelectionChanged {
        /// Sequence of the selected reading, `None` when cleared.
        sequence: Option<u64>,
    },
}

impl HistoryEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReadingAdded { .. } => "reading_added",
            Self::ThresholdChanged { .. } => "threshold_changed",
            Self::StreamingChanged { .. } => "streaming_changed",
            Self::HistoryCleared { .. } => "history_cleared",
            Self::SelectionChanged { .. } => "selection_changed",
        }
    }
}

/// Broadcast sender for history events
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<HistoryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all subscribers. Having none is fine.
    pub fn publish(&self, event: HistoryEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
