//! Attack comparison: synthetic attack traffic against normal samples.
//!
//! ```text
//! generate_attack_samples(kind, count) ──┬── channel averages (attack)
//! fetch_samples(len)                     ├── channel averages (normal)
//! first 10 attack samples ── JoinSet ×10 ┘── SVM detection rate
//! ```
//!
//! Generation and the normal fetch must succeed. A sample whose SVM call
//! fails (or whose datetime cannot be read) is counted as not detected.

use std::num::NonZeroUsize;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::gateway::{AttackKind, GatewayResult, SharedGateway};
use crate::reading::{Channel, ChannelValues, RawSample, ReadingPayload};
use crate::stats::channel_averages;

/// Attack samples sent through the SVM per comparison.
pub const DETECTION_SAMPLE: usize = 10;

/// Mean value of one channel for normal and attack traffic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelContrast {
    pub channel: Channel,
    pub normal: f64,
    pub attack: f64,
}

impl ChannelContrast {
    /// Attack mean relative to normal, `None` when the normal mean is 0.
    pub fn ratio(&self) -> Option<f64> {
        (self.normal != 0.0).then(|| self.attack / self.normal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackReport {
    pub kind: AttackKind,
    pub attack_samples: usize,
    pub normal_samples: usize,
    /// In channel order.
    pub channels: Vec<ChannelContrast>,
    /// Samples sent to the SVM.
    pub classified: usize,
    pub detected: usize,
    /// Samples whose classification failed and counted as not detected.
    pub failed: usize,
}

impl AttackReport {
    /// Percent of classified samples the SVM flagged.
    pub fn detection_rate(&self) -> f64 {
        if self.classified == 0 {
            0.0
        } else {
            self.detected as f64 / self.classified as f64 * 100.0
        }
    }
}

/// Runs attack-vs-normal comparisons through a gateway.
#[derive(Clone)]
pub struct AttackComparison {
    gateway: SharedGateway,
}

impl AttackComparison {
    pub fn new(gateway: SharedGateway) -> Self {
        Self { gateway }
    }

    /// # Errors
    ///
    /// Propagates gateway failures from attack generation or the normal
    /// sample fetch. Per-sample SVM failures are absorbed into the report.
    pub async fn run(&self, kind: AttackKind, count: NonZeroUsize) -> GatewayResult<AttackReport> {
        let attack = self.gateway.generate_attack_samples(kind, count).await?;
        let normal_count = NonZeroUsize::new(attack.len()).unwrap_or(count);
        let normal = self.gateway.fetch_samples(normal_count).await?;

        let attack_values: Vec<ChannelValues> =
            attack.iter().map(|a| a.sample.channel_values()).collect();
        let normal_values: Vec<ChannelValues> =
            normal.iter().map(RawSample::channel_values).collect();
        let attack_avg = channel_averages(&attack_values);
        let normal_avg = channel_averages(&normal_values);

        let channels = Channel::ALL
            .iter()
            .map(|&channel| ChannelContrast {
                channel,
                normal: normal_avg.or_zero(channel),
                attack: attack_avg.or_zero(channel),
            })
            .collect();

        let outcomes = self
            .classify_batch(attack.iter().take(DETECTION_SAMPLE).map(|a| &a.sample))
            .await;
        let detected = outcomes.iter().filter(|o| **o == Some(true)).count();
        let failed = outcomes.iter().filter(|o| o.is_none()).count();

        let report = AttackReport {
            kind,
            attack_samples: attack.len(),
            normal_samples: normal.len(),
            channels,
            classified: outcomes.len(),
            detected,
            failed,
        };
        info!(
            attack = %kind,
            detected,
            classified = report.classified,
            rate = report.detection_rate(),
            "attack comparison complete"
        );
        Ok(report)
    }

    /// SVM verdict per sample in input order; `None` where it could not be
    /// classified.
    async fn classify_batch<'a>(
        &self,
        samples: impl Iterator<Item = &'a RawSample>,
    ) -> Vec<Option<bool>> {
        let mut join_set: JoinSet<(usize, Option<bool>)> = JoinSet::new();
        let mut total = 0;

        for (idx, sample) in samples.enumerate() {
            total += 1;
            let payload = match sample.to_reading() {
                Ok(reading) => ReadingPayload::from_reading(&reading),
                Err(e) => {
                    debug!(idx, error = %e, "attack sample skipped");
                    continue;
                }
            };
            let gateway = self.gateway.clone();
            join_set.spawn(async move {
                match gateway.classify_svm(&payload).await {
                    Ok(detection) => (idx, Some(detection.is_anomaly)),
                    Err(e) => {
                        debug!(idx, error = %e, "attack sample classification failed");
                        (idx, None)
                    }
                }
            });
        }

        let mut outcomes = vec![None; total];
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((idx, outcome)) => outcomes[idx] = outcome,
                Err(e) => warn!(error = %e, "classification task panicked"),
            }
        }
        outcomes
    }
}
