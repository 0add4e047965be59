//! Monitoring session: one history store shared by the scheduler, the
//! consensus orchestrator and the explanation selector.
//!
//! The streaming flag lives in the store and the scheduler follows it, so
//! acquisition can be toggled through the session or the store alike.

use std::num::NonZeroUsize;
use std::time::Duration;

use acquisition::history::HistoryResult;
use acquisition::{
    AnnotatedReading, AttackComparison, AttackKind, AttackReport, CompareResult,
    ConsensusOrchestrator, ConsensusResult, Explanation, ExplanationSelector, GatewayResult,
    HealthStatus, HistoryEvent, HistorySnapshot, HistoryStats, HistoryStore, HttpGateway,
    SharedGateway, SharedHistoryStore, StreamHealth, StreamingScheduler, Threshold,
};
use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MonitorConfig;

pub struct MonitorSession {
    id: Uuid,
    store: SharedHistoryStore,
    gateway: SharedGateway,
    scheduler: StreamingScheduler,
    orchestrator: ConsensusOrchestrator,
    selector: ExplanationSelector,
    attacks: AttackComparison,
}

impl MonitorSession {
    /// Session against the HTTP backend named in `config`.
    pub fn connect(config: &MonitorConfig) -> Result<Self> {
        let gateway = HttpGateway::new(config.backend_url.clone(), config.connect_timeout())
            .context("Failed to build detection gateway")?;
        Self::with_gateway(config, gateway.shared())
    }

    pub fn with_gateway(config: &MonitorConfig, gateway: SharedGateway) -> Result<Self> {
        let store = HistoryStore::with_config(config.history_config()?).shared();
        let session = Self {
            id: Uuid::new_v4(),
            scheduler: StreamingScheduler::with_interval(
                store.clone(),
                gateway.clone(),
                config.interval(),
            ),
            orchestrator: ConsensusOrchestrator::new(store.clone(), gateway.clone()),
            selector: ExplanationSelector::new(store.clone()),
            attacks: AttackComparison::new(gateway.clone()),
            store,
            gateway,
        };
        info!(
            session = %session.id,
            backend = %config.backend_url,
            interval_ms = config.interval_ms,
            "monitor session created"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &SharedHistoryStore {
        &self.store
    }

    // ── Streaming ────────────────────────────────────────────────────────

    /// Set the streaming flag, returning the previous value. The scheduler
    /// follows the flag, so this is the same as toggling it on the store.
    pub fn set_streaming(&self, streaming: bool) -> bool {
        let previous = self.store.set_streaming(streaming);
        debug!(session = %self.id, streaming, previous, "streaming toggled");
        previous
    }

    pub fn is_streaming(&self) -> bool {
        self.store.is_streaming()
    }

    pub fn stream_health(&self) -> StreamHealth {
        self.scheduler.health()
    }

    /// Wait until history holds at least `n` readings, or `timeout` passes.
    pub async fn wait_for_readings(&self, n: usize, timeout: Duration) -> bool {
        let mut events = self.store.subscribe();
        let reached = async {
            while self.store.reading_count() < n {
                match events.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        };
        let _ = tokio::time::timeout(timeout, reached).await;
        self.store.reading_count() >= n
    }

    // ── History ──────────────────────────────────────────────────────────

    pub fn set_threshold(&self, value: u32) -> HistoryResult<()> {
        self.store.set_threshold(Threshold::new(value)?);
        Ok(())
    }

    pub fn clear_history(&self) {
        self.store.clear_history();
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.store.snapshot()
    }

    pub fn stats(&self) -> Option<HistoryStats> {
        HistoryStats::from_snapshot(&self.store.snapshot())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.store.subscribe()
    }

    // ── Analysis ─────────────────────────────────────────────────────────

    pub async fn compare(&self) -> CompareResult<ConsensusResult> {
        self.orchestrator.compare().await
    }

    pub fn select(&self, record: AnnotatedReading) -> HistoryResult<()> {
        self.selector.select(record)
    }

    /// Select the newest anomaly still in the anomaly buffer.
    pub fn select_latest_anomaly(&self) -> Option<AnnotatedReading> {
        let latest = self.store.anomalies().pop()?;
        self.selector.select(latest.clone()).ok()?;
        Some(latest)
    }

    pub fn clear_selection(&self) -> Option<AnnotatedReading> {
        self.selector.clear()
    }

    pub fn explanation(&self) -> Option<Explanation> {
        self.selector.explanation()
    }

    pub async fn attack(
        &self,
        kind: AttackKind,
        count: NonZeroUsize,
    ) -> GatewayResult<AttackReport> {
        self.attacks.run(kind, count).await
    }

    pub async fn backend_health(&self) -> GatewayResult<HealthStatus> {
        self.gateway.health().await
    }
}
