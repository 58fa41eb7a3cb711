use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use super::serde_secs;
use super::types::RequestRecord;

const PERCENT_DIVISOR: u64 = 100;
const PERCENTILE_P50: u64 = 50;
const PERCENTILE_P90: u64 = 90;
const PERCENTILE_P99: u64 = 99;
/// Rounding offset for percentile selection.
const PERCENTILE_ROUNDING: u64 = 50;

/// Aggregate view of one run, computed from its records on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: u64,
    /// Counts per status code; transport failures are counted under `0`.
    pub status_counts: BTreeMap<u16, u64>,
    pub success: u64,
    pub throttled: u64,
    pub server_errors: u64,
    pub transport_failures: u64,
    pub timeouts: u64,
    #[serde(with = "serde_secs")]
    pub avg_latency: Duration,
    #[serde(with = "serde_secs")]
    pub max_latency: Duration,
    #[serde(with = "serde_secs")]
    pub p50: Duration,
    #[serde(with = "serde_secs")]
    pub p90: Duration,
    #[serde(with = "serde_secs")]
    pub p99: Duration,
    /// Completed requests per second of wall-clock run time.
    pub achieved_rps: f64,
    /// Issuance time of the earliest 429, if any.
    #[serde(serialize_with = "serde_secs::serialize_opt")]
    pub first_throttle_time: Option<Duration>,
}

impl RunSummary {
    #[must_use]
    pub fn count_for(&self, status_code: u16) -> u64 {
        self.status_counts.get(&status_code).copied().unwrap_or(0)
    }
}

#[must_use]
pub fn summarize(records: &[RequestRecord], elapsed: Duration) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut latencies: Vec<Duration> = Vec::with_capacity(records.len());
    let mut latency_total = Duration::ZERO;

    for record in records {
        summary.total = summary.total.saturating_add(1);
        let slot = summary.status_counts.entry(record.status_code).or_insert(0);
        *slot = slot.saturating_add(1);

        if record.is_success() {
            summary.success = summary.success.saturating_add(1);
        }
        if record.is_throttled() {
            summary.throttled = summary.throttled.saturating_add(1);
            summary.first_throttle_time = Some(
                summary
                    .first_throttle_time
                    .map_or(record.relative_time, |seen| seen.min(record.relative_time)),
            );
        }
        if record.is_server_error() {
            summary.server_errors = summary.server_errors.saturating_add(1);
        }
        if record.is_transport_failure() {
            summary.transport_failures = summary.transport_failures.saturating_add(1);
        }
        if record.timed_out {
            summary.timeouts = summary.timeouts.saturating_add(1);
        }

        latency_total = latency_total.saturating_add(record.latency);
        summary.max_latency = summary.max_latency.max(record.latency);
        latencies.push(record.latency);
    }

    if let Ok(count) = u32::try_from(latencies.len())
        && count > 0
    {
        summary.avg_latency = latency_total.checked_div(count).unwrap_or_default();
    }

    latencies.sort_unstable();
    summary.p50 = percentile(&latencies, PERCENTILE_P50);
    summary.p90 = percentile(&latencies, PERCENTILE_P90);
    summary.p99 = percentile(&latencies, PERCENTILE_P99);

    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        summary.achieved_rps = summary.total as f64 / secs;
    }
    summary
}

fn percentile(values: &[Duration], percentile: u64) -> Duration {
    let count = values.len().saturating_sub(1) as u64;
    let index = percentile
        .saturating_mul(count)
        .saturating_add(PERCENTILE_ROUNDING)
        .checked_div(PERCENT_DIVISOR)
        .unwrap_or(0);
    let idx = usize::try_from(index).unwrap_or_else(|_| values.len().saturating_sub(1));
    values.get(idx).copied().unwrap_or_default()
}
