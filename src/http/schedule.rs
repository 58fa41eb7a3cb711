use std::time::Duration;

use tokio::time::Instant;

use crate::domain::TestConfig;

/// Burst timeline of one run, anchored to an absolute start.
///
/// Burst `k` is due at `start + k * interval`. Deadlines never depend on
/// when the previous burst actually fired, so oversleeping one tick does not
/// push back the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstSchedule {
    interval: Duration,
    duration: Duration,
    bursts: u64,
    burst_size: usize,
    max_dispatches: u64,
}

impl BurstSchedule {
    /// Schedule for a validated config.
    #[must_use]
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            interval: config.tick_interval(),
            duration: config.duration,
            bursts: config.max_bursts(),
            burst_size: config.burst_size,
            max_dispatches: config.max_dispatches(),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Offset of burst `index` from the start, or `None` once it would fall
    /// at or past the nominal duration. Burst zero is always due.
    #[must_use]
    pub fn offset(&self, index: u64) -> Option<Duration> {
        if index == 0 {
            return Some(Duration::ZERO);
        }
        if index >= self.bursts {
            return None;
        }
        let nanos = self.interval.as_nanos().checked_mul(u128::from(index))?;
        Some(Duration::from_nanos(u64::try_from(nanos).ok()?))
    }

    /// Absolute deadline of burst `index`.
    #[must_use]
    pub fn deadline(&self, start: Instant, index: u64) -> Option<Instant> {
        self.offset(index)
            .and_then(|offset| start.checked_add(offset))
    }

    /// Slots to release in the next burst, given how many were already
    /// dispatched. Zero once the request budget is spent.
    #[must_use]
    pub fn burst_len(&self, dispatched: u64) -> usize {
        let left = self.max_dispatches.saturating_sub(dispatched);
        usize::try_from(left).map_or(self.burst_size, |left| left.min(self.burst_size))
    }

    /// True while new bursts may still be released.
    #[must_use]
    pub fn is_open(&self, elapsed: Duration) -> bool {
        elapsed < self.duration
    }
}
