//! Stream health tracking
//!
//! Observes scheduler cycle outcomes and derives a coarse health level from
//! consecutive failures. Purely observational: nothing here stops or slows
//! the schedule.
//!
//! ```text
//! Healthy ──3 failures──▶ Degraded ──6 failures──▶ Failing
//!    ▲                                                │
//!    └──────────── 3 consecutive successes ───────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Consecutive failures before the stream is considered degraded.
pub const DEGRADED_AFTER: u32 = 3;
/// Consecutive failures before the stream is considered failing.
pub const FAILING_AFTER: u32 = 6;
/// Consecutive successes that restore a degraded stream.
pub const RECOVER_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Failing,
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failing => write!(f, "failing"),
        }
    }
}

/// Health of the acquisition stream, tracked over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamHealth {
    pub level: HealthLevel,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub total_cycles: u64,
    pub total_failures: u64,
    /// Last observed error message, cleared on recovery.
    pub last_error: Option<String>,
    /// When the level last changed.
    pub last_change: DateTime<Utc>,
}

impl StreamHealth {
    pub fn new() -> Self {
        Self {
            level: HealthLevel::Healthy,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_cycles: 0,
            total_failures: 0,
            last_error: None,
            last_change: Utc::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.total_cycles += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        if self.level != HealthLevel::Healthy && self.consecutive_successes >= RECOVER_AFTER {
            self.set_level(HealthLevel::Healthy);
            self.last_error = None;
        }
    }

    pub fn record_failure(&mut self, error: &str) {
        self.total_cycles += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_error = Some(error.to_string());

        let level = if self.consecutive_failures >= FAILING_AFTER {
            HealthLevel::Failing
        } else if self.consecutive_failures >= DEGRADED_AFTER {
            HealthLevel::Degraded
        } else {
            self.level
        };
        self.set_level(level);
    }

    fn set_level(&mut self, level: HealthLevel) {
        if level != self.level {
            self.level = level;
            self.last_change = Utc::now();
        }
    }

    /// Failure rate as a fraction (0.0–1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_cycles as f64
        }
    }
}

impl Default for StreamHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle shared between the scheduler and its cycles.
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    inner: Arc<Mutex<StreamHealth>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_success();
    }

    pub fn record_failure(&self, error: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_failure(error);
    }

    pub fn snapshot(&self) -> StreamHealth {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
