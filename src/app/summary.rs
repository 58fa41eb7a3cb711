use std::time::Duration;

use chrono::{DateTime, Utc};
use ratelimit_tester::metrics::{RateLimitSignals, TestRunResult};

pub(crate) fn print_summary(result: &TestRunResult) {
    for line in summary_lines(result, Utc::now()) {
        println!("{}", line);
    }
}

/// Human-readable report. `now` anchors HTTP-date `Retry-After` values.
pub(crate) fn summary_lines(result: &TestRunResult, now: DateTime<Utc>) -> Vec<String> {
    let config = &result.config;
    let summary = result.summary();
    let detected = result.detect_rate_limit_headers();
    let mut lines = Vec::new();

    lines.push(format!("Target: {} {}", config.method, config.url));
    lines.push(format!(
        "Schedule: {} rps in bursts of {} for {}",
        config.rps,
        config.burst_size,
        fmt_secs(config.duration)
    ));
    let status = if result.cancelled { " (cancelled)" } else { "" };
    lines.push(format!("Elapsed: {}{}", fmt_secs(result.elapsed), status));
    lines.push(format!(
        "Requests: {} dispatched, {} completed, {} abandoned",
        result.dispatched, summary.total, result.abandoned
    ));
    lines.push(format!("Achieved Rate: {:.2} rps", summary.achieved_rps));

    lines.push("Status Codes:".to_owned());
    if summary.status_counts.is_empty() {
        lines.push("  (none)".to_owned());
    }
    for (code, count) in &summary.status_counts {
        let label = if *code == 0 {
            "transport failure".to_owned()
        } else {
            code.to_string()
        };
        lines.push(format!("  {}: {}", label, count));
    }
    lines.push(format!(
        "Success: {}  Throttled (429): {}  Server Errors: {}  Timeouts: {}",
        summary.success, summary.throttled, summary.server_errors, summary.timeouts
    ));
    lines.push(format!(
        "Latency: avg {} / p50 {} / p90 {} / p99 {} / max {}",
        fmt_ms(summary.avg_latency),
        fmt_ms(summary.p50),
        fmt_ms(summary.p90),
        fmt_ms(summary.p99),
        fmt_ms(summary.max_latency)
    ));
    match summary.first_throttle_time {
        Some(at) => lines.push(format!("First 429 At: {}", fmt_secs(at))),
        None => lines.push("First 429 At: never".to_owned()),
    }

    if detected.is_empty() {
        lines.push("Rate-Limit Headers: none detected".to_owned());
        return lines;
    }
    lines.push("Rate-Limit Headers:".to_owned());
    for (name, value) in detected.iter() {
        lines.push(format!("  {}: {}", name, value));
    }
    let signals = RateLimitSignals::from_detected(&detected, now);
    if !signals.is_empty() {
        lines.push(format!("Interpreted: {}", fmt_signals(&signals)));
    }
    lines
}

fn fmt_signals(signals: &RateLimitSignals) -> String {
    let mut parts = Vec::new();
    if let Some(limit) = signals.limit {
        parts.push(format!("limit={}", limit));
    }
    if let Some(remaining) = signals.remaining {
        parts.push(format!("remaining={}", remaining));
    }
    if let Some(reset) = signals.reset {
        parts.push(format!("reset={}", reset));
    }
    if let Some(retry_after) = signals.retry_after {
        parts.push(format!("retry-after={}", fmt_secs(retry_after)));
    }
    if let Some(policy) = signals.policy.as_deref() {
        parts.push(format!("policy={}", policy));
    }
    parts.join(" ")
}

fn fmt_secs(value: Duration) -> String {
    format!("{:.2}s", value.as_secs_f64())
}

fn fmt_ms(value: Duration) -> String {
    format!("{:.1}ms", value.as_secs_f64() * 1000.0)
}
