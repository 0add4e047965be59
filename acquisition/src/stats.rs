//! Aggregate statistics over a history snapshot.
//!
//! Channels a reading did not report count as 0, the same value the
//! detectors are sent.

use serde::Serialize;

use crate::history::HistorySnapshot;
use crate::reading::{Channel, ChannelValues};

/// Spread of one channel across the readings buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStats {
    pub channel: Channel,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// `max - min`.
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_readings: usize,
    pub anomaly_count: usize,
    pub normal_count: usize,
    /// Percent of readings flagged anomalous.
    pub detection_rate: f64,
    pub avg_score: f64,
    /// In channel order.
    pub channels: Vec<ChannelStats>,
    /// Channel with the widest range; the first one wins ties.
    pub most_volatile: Channel,
}

impl HistoryStats {
    /// `None` when there are no readings.
    ///
    /// The anomaly count comes from the anomaly buffer, which has its own
    /// capacity and eviction, so the normal count is floored at zero.
    pub fn from_snapshot(snapshot: &HistorySnapshot) -> Option<Self> {
        let total = snapshot.readings.len();
        if total == 0 {
            return None;
        }
        let anomaly_count = snapshot.anomalies.len();
        let avg_score = snapshot
            .readings
            .iter()
            .map(|r| finite_or_zero(r.detection.anomaly_score))
            .sum::<f64>()
            / total as f64;

        let channels: Vec<ChannelStats> = Channel::ALL
            .iter()
            .map(|&channel| {
                let values = snapshot
                    .readings
                    .iter()
                    .map(|r| r.reading.values().or_zero(channel));
                channel_stats(channel, values, total)
            })
            .collect();

        let most_volatile = channels
            .iter()
            .fold(None::<&ChannelStats>, |best, c| match best {
                Some(b) if b.range >= c.range => Some(b),
                _ => Some(c),
            })
            .map_or(Channel::ALL[0], |c| c.channel);

        Some(Self {
            total_readings: total,
            anomaly_count,
            normal_count: total.saturating_sub(anomaly_count),
            detection_rate: anomaly_count as f64 / total as f64 * 100.0,
            avg_score,
            channels,
            most_volatile,
        })
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelStats> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

fn channel_stats(channel: Channel, values: impl Iterator<Item = f64>, count: usize) -> ChannelStats {
    let (min, max, sum) = values.fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
    );
    ChannelStats {
        channel,
        min,
        max,
        avg: sum / count as f64,
        range: max - min,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Per-channel mean over a set of samples, missing values counted as 0.
/// Empty input yields all zeros.
pub fn channel_averages<'a>(samples: impl IntoIterator<Item = &'a ChannelValues>) -> ChannelValues {
    let mut sums = [0.0; crate::reading::CHANNEL_COUNT];
    let mut count = 0usize;
    for values in samples {
        for (sum, &channel) in sums.iter_mut().zip(Channel::ALL.iter()) {
            *sum += values.or_zero(channel);
        }
        count += 1;
    }

    let mut averages = ChannelValues::default();
    for (&channel, sum) in Channel::ALL.iter().zip(sums) {
        let avg = if count == 0 { 0.0 } else { sum / count as f64 };
        averages.set(channel, Some(avg));
    }
    averages
}
