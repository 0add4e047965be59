//! Explanation Selector
//!
//! Select/clear over a single anomaly record. The selection is a copy taken
//! at select time, so it survives the record's eviction from history and
//! any number of scheduler ticks until it is cleared.

use serde::Serialize;

use crate::detection::{AnnotatedReading, FeatureAttribution};
use crate::history::{HistoryResult, SharedHistoryStore};

/// Contributors shown in an explanation.
pub const TOP_CONTRIBUTORS: usize = 5;
/// Contribution (percent) above which a channel is called out.
pub const HIGH_CONTRIBUTION: f64 = 15.0;

/// One channel's share of an anomaly score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contributor {
    /// 1-based position as reported by the detector.
    pub rank: usize,
    pub attribution: FeatureAttribution,
    pub high: bool,
}

/// Why the selected reading was flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub sequence: u64,
    pub anomaly_score: f64,
    /// Percent.
    pub confidence: f64,
    pub top: Vec<Contributor>,
    /// Channels past the top five, as reported.
    pub remaining: Vec<FeatureAttribution>,
}

impl Explanation {
    pub fn from_record(record: &AnnotatedReading) -> Self {
        let features = record.detection.attribution.as_deref().unwrap_or_default();
        let split = features.len().min(TOP_CONTRIBUTORS);

        let top = features[..split]
            .iter()
            .enumerate()
            .map(|(i, f)| Contributor {
                rank: i + 1,
                attribution: f.clone(),
                high: f.contribution > HIGH_CONTRIBUTION,
            })
            .collect();

        Self {
            sequence: record.sequence,
            anomaly_score: record.detection.anomaly_score,
            confidence: record.detection.confidence * 100.0,
            top,
            remaining: features[split..].to_vec(),
        }
    }

    /// True when the detector returned no attribution at all.
    pub fn is_unexplained(&self) -> bool {
        self.top.is_empty()
    }
}

/// Select/clear handle over the store's selection slot.
#[derive(Clone)]
pub struct ExplanationSelector {
    store: SharedHistoryStore,
}

impl ExplanationSelector {
    pub fn new(store: SharedHistoryStore) -> Self {
        Self { store }
    }

    /// Replace any prior selection. Non-anomalous records are rejected and
    /// leave the current selection in place.
    pub fn select(&self, record: AnnotatedReading) -> HistoryResult<()> {
        self.store.select_anomaly(record)
    }

    pub fn clear(&self) -> Option<AnnotatedReading> {
        self.store.clear_selection()
    }

    pub fn current(&self) -> Option<AnnotatedReading> {
        self.store.selected_anomaly()
    }

    pub fn explanation(&self) -> Option<Explanation> {
        self.current().as_ref().map(Explanation::from_record)
    }
}
