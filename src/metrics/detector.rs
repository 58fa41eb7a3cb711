//! Extraction of server-communicated rate-limit signals.
//!
//! Detection is a pure fold over request records: nothing is remembered
//! between runs, and the same records always yield the same map.
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::RequestRecord;

/// Header names recognised verbatim. Anything containing `ratelimit` is
/// matched as well, which covers the `x-ratelimit-*` and IETF `ratelimit-*`
/// families.
const RATE_LIMIT_HEADERS: [&str; 7] = [
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-reset",
    "retry-after",
    "x-rate-limit-limit",
    "x-rate-limit-remaining",
    "x-rate-limit-reset",
];
const RATE_LIMIT_FRAGMENT: &str = "ratelimit";

const LIMIT_HEADERS: [&str; 3] = ["x-ratelimit-limit", "ratelimit-limit", "x-rate-limit-limit"];
const REMAINING_HEADERS: [&str; 3] = [
    "x-ratelimit-remaining",
    "ratelimit-remaining",
    "x-rate-limit-remaining",
];
const RESET_HEADERS: [&str; 3] = ["x-ratelimit-reset", "ratelimit-reset", "x-rate-limit-reset"];
const POLICY_HEADERS: [&str; 2] = ["ratelimit-policy", "x-ratelimit-policy"];
const RETRY_AFTER_HEADER: &str = "retry-after";

#[must_use]
pub fn is_rate_limit_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    RATE_LIMIT_HEADERS.contains(&name.as_str()) || name.contains(RATE_LIMIT_FRAGMENT)
}

/// Lower-cased rate-limit header name to its most recent value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectedHeaders(BTreeMap<String, String>);

impl DetectedHeaders {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }
}

/// Running state of the detection fold.
///
/// Each entry remembers the issuance time of the record it came from, so a
/// later-issued record wins no matter in which order records complete.
#[derive(Debug, Clone, Default)]
pub struct RateLimitHeaderFold {
    entries: BTreeMap<String, (Duration, String)>,
}

impl RateLimitHeaderFold {
    /// Folds one record in. Returns true when the detected map changed.
    pub fn observe(&mut self, record: &RequestRecord) -> bool {
        let mut changed = false;
        for (name, value) in record.headers.iter() {
            if !is_rate_limit_header(name) {
                continue;
            }
            let key = name.to_ascii_lowercase();
            let newer = self
                .entries
                .get(&key)
                .is_none_or(|(seen_at, _)| record.relative_time >= *seen_at);
            if !newer {
                continue;
            }
            let previous = self
                .entries
                .insert(key, (record.relative_time, value.to_owned()));
            if previous.is_none_or(|(_, seen_value)| seen_value != value) {
                changed = true;
            }
        }
        changed
    }

    #[must_use]
    pub fn detected(&self) -> DetectedHeaders {
        DetectedHeaders(
            self.entries
                .iter()
                .map(|(name, (_, value))| (name.clone(), value.clone()))
                .collect(),
        )
    }
}

/// Scans every record and returns the rate-limit headers the server sent.
///
/// When a header was seen with different values, the value from the record
/// issued last wins; records issued at the same instant resolve in
/// completion order. No matches yields an empty map.
#[must_use]
pub fn detect_rate_limit_headers(records: &[RequestRecord]) -> DetectedHeaders {
    records
        .iter()
        .fold(RateLimitHeaderFold::default(), |mut fold, record| {
            fold.observe(record);
            fold
        })
        .detected()
}

/// Typed reading of the few headers whose meaning is standardised enough to
/// interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitSignals {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
    pub retry_after: Option<Duration>,
    pub policy: Option<String>,
}

impl RateLimitSignals {
    #[must_use]
    pub fn from_detected(detected: &DetectedHeaders, now: DateTime<Utc>) -> Self {
        Self {
            limit: detected.first_of(&LIMIT_HEADERS).and_then(leading_number),
            remaining: detected.first_of(&REMAINING_HEADERS).and_then(leading_number),
            reset: detected.first_of(&RESET_HEADERS).and_then(leading_number),
            retry_after: detected
                .get(RETRY_AFTER_HEADER)
                .and_then(|value| parse_retry_after(value, now)),
            policy: detected.first_of(&POLICY_HEADERS).map(str::to_owned),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
            && self.retry_after.is_none()
            && self.policy.is_none()
    }
}

/// Parses `Retry-After` as delta-seconds or an HTTP-date. Dates in the past
/// mean "retry now".
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc).signed_duration_since(now);
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Reads the leading integer of values such as `100`, `100, 100;w=60`, or
/// `100;w=60`.
fn leading_number(value: &str) -> Option<u64> {
    let token = value
        .split([',', ';'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    token.parse().ok()
}
