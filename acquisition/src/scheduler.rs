//! Streaming Scheduler
//!
//! A cancellable periodic task issuing one acquire-and-classify cycle per
//! tick while the history store's streaming flag is on.
//!
//! ```text
//!          flag on                          flag off
//!   Idle ─────────────▶ Active ─────────────────────▶ Idle
//!          cycle now,           cancel future ticks,
//!          arm ticker           in-flight cycles finish
//! ```
//!
//! Each cycle runs on its own task, so a slow round-trip never delays the
//! next tick. Cycles commit in completion order, which may differ from the
//! order they were issued in.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detection::AnnotatedReading;
use crate::gateway::{GatewayError, GatewayResult, SharedGateway};
use crate::health::{HealthMonitor, StreamHealth};
use crate::history::SharedHistoryStore;
use crate::reading::ReadingPayload;

/// Default cadence between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// One acquire-and-classify step, shared by every spawned cycle task.
struct Cycle {
    store: SharedHistoryStore,
    gateway: SharedGateway,
    health: HealthMonitor,
    issued: AtomicU64,
}

impl Cycle {
    async fn acquire(&self) -> GatewayResult<AnnotatedReading> {
        let samples = self.gateway.fetch_samples(NonZeroUsize::MIN).await?;
        let sample = samples
            .first()
            .ok_or_else(|| GatewayError::invalid("/api/data/sample", "empty sample batch"))?;
        let reading = sample
            .to_reading()
            .map_err(|e| GatewayError::invalid("/api/data/sample", e))?;

        let detection = self
            .gateway
            .classify_svm(&ReadingPayload::from_reading(&reading))
            .await?;

        Ok(self.store.add_reading(reading, detection))
    }

    async fn run(self: Arc<Self>) {
        let cycle = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        match self.acquire().await {
            Ok(record) => {
                self.health.record_success();
                debug!(
                    cycle,
                    sequence = record.sequence,
                    anomaly = record.is_anomaly(),
                    score = record.detection.anomaly_score,
                    "reading committed"
                );
            }
            Err(e) => {
                self.health.record_failure(&e.to_string());
                warn!(cycle, error = %e, "acquisition cycle abandoned");
            }
        }
    }
}

/// Periodic acquisition driver for one monitoring session.
///
/// The scheduler has no start or stop of its own: a driver task watches the
/// store's streaming flag and arms or cancels the ticker on each transition.
pub struct StreamingScheduler {
    cycle: Arc<Cycle>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl StreamingScheduler {
    /// Must be called from within a Tokio runtime.
    pub fn new(store: SharedHistoryStore, gateway: SharedGateway) -> Self {
        Self::with_interval(store, gateway, DEFAULT_INTERVAL)
    }

    /// A zero interval is raised to one millisecond. Must be called from
    /// within a Tokio runtime.
    pub fn with_interval(
        store: SharedHistoryStore,
        gateway: SharedGateway,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let streaming = store.watch_streaming();
        let cycle = Arc::new(Cycle {
            store,
            gateway,
            health: HealthMonitor::new(),
            issued: AtomicU64::new(0),
        });
        let shutdown = CancellationToken::new();
        tokio::spawn(drive(
            Arc::clone(&cycle),
            interval,
            streaming,
            shutdown.clone(),
        ));

        Self {
            cycle,
            interval,
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single cycle inline, outside the schedule.
    pub async fn run_once(&self) -> GatewayResult<AnnotatedReading> {
        self.cycle.acquire().await
    }

    pub fn health(&self) -> StreamHealth {
        self.cycle.health.snapshot()
    }

    /// Cycles dispatched by the schedule so far.
    pub fn cycles_issued(&self) -> u64 {
        self.cycle.issued.load(Ordering::Relaxed)
    }
}

impl Drop for StreamingScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Follow the streaming flag until the scheduler is dropped.
///
/// Off → on runs one cycle now and arms the ticker; on → off cancels the
/// ticker only, so cycles already dispatched still commit. Flips that happen
/// between two wake-ups collapse into the latest value.
async fn drive(
    cycle: Arc<Cycle>,
    period: Duration,
    mut streaming: watch::Receiver<bool>,
    shutdown: CancellationToken,
) {
    let mut ticks: Option<CancellationToken> = None;

    loop {
        let on = *streaming.borrow_and_update();
        match (on, ticks.is_some()) {
            (true, false) => {
                let token = shutdown.child_token();
                tokio::spawn(Arc::clone(&cycle).run());
                tokio::spawn(tick_loop(Arc::clone(&cycle), period, token.clone()));
                ticks = Some(token);
                info!(interval_ms = period.as_millis() as u64, "streaming started");
            }
            (false, true) => {
                if let Some(token) = ticks.take() {
                    token.cancel();
                }
                info!("streaming stopped");
            }
            _ => {}
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = streaming.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(token) = ticks {
        token.cancel();
    }
    debug!("streaming driver exited");
}

async fn tick_loop(cycle: Arc<Cycle>, period: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::spawn(Arc::clone(&cycle).run());
            }
        }
    }
    debug!("tick loop exited");
}
