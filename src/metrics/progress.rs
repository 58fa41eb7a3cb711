//! Live view of a run in progress.
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use super::detector::DetectedHeaders;
use super::serde_secs;

/// Lifecycle of one run. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Draining,
    Done,
}

impl RunPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub phase: RunPhase,
    #[serde(with = "serde_secs")]
    pub elapsed: Duration,
    pub dispatched: u64,
    pub completed: u64,
    pub transport_failures: u64,
    pub throttled: u64,
    /// Rate-limit headers seen so far, folded the same way as the final
    /// result.
    pub detected_headers: DetectedHeaders,
    #[serde(with = "serde_secs")]
    pub p50: Duration,
    #[serde(with = "serde_secs")]
    pub p90: Duration,
    #[serde(with = "serde_secs")]
    pub p99: Duration,
}

impl RunSnapshot {
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }
}

/// Shared handle over the run's snapshot channel.
///
/// The scheduler owns the phase and dispatch count; the collector owns the
/// rest. Both write through `send_modify`, so neither can clobber the other.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: Arc<watch::Sender<RunSnapshot>>,
}

impl ProgressPublisher {
    #[must_use]
    pub fn new(tx: watch::Sender<RunSnapshot>) -> Self {
        Self { tx: Arc::new(tx) }
    }

    /// Publisher nobody listens to yet; `subscribe` still works.
    #[must_use]
    pub fn detached() -> Self {
        let (tx, _rx) = watch::channel(RunSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.tx.borrow().clone()
    }

    /// Advances the phase. Backward transitions are ignored.
    pub fn advance(&self, phase: RunPhase) {
        self.tx.send_if_modified(|snapshot| {
            if phase > snapshot.phase {
                snapshot.phase = phase;
                true
            } else {
                false
            }
        });
    }

    pub fn add_dispatched(&self, count: u64) {
        self.tx.send_modify(|snapshot| {
            snapshot.dispatched = snapshot.dispatched.saturating_add(count);
        });
    }

    pub fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut RunSnapshot),
    {
        self.tx.send_modify(apply);
    }
}
