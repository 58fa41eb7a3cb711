use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TestConfig;

use super::detector::{DetectedHeaders, detect_rate_limit_headers};
use super::headers::ResponseHeaders;
use super::serde_secs;
use super::summary::{RunSummary, summarize};

/// Status recorded when no HTTP response was received at all.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// One dispatched request, as observed by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// HTTP status, or [`TRANSPORT_FAILURE_STATUS`] when the request never
    /// produced a response.
    pub status_code: u16,
    /// Send-to-completion, or send-to-failure.
    #[serde(with = "serde_secs")]
    pub latency: Duration,
    /// Issuance time relative to the start of the run.
    #[serde(with = "serde_secs")]
    pub relative_time: Duration,
    pub headers: ResponseHeaders,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
}

impl RequestRecord {
    #[must_use]
    pub const fn response(
        status_code: u16,
        latency: Duration,
        relative_time: Duration,
        headers: ResponseHeaders,
    ) -> Self {
        Self {
            status_code,
            latency,
            relative_time,
            headers,
            error: None,
            timed_out: false,
        }
    }

    #[must_use]
    pub const fn transport_failure(
        latency: Duration,
        relative_time: Duration,
        error: String,
        timed_out: bool,
    ) -> Self {
        Self {
            status_code: TRANSPORT_FAILURE_STATUS,
            latency,
            relative_time,
            headers: ResponseHeaders::new(),
            error: Some(error),
            timed_out,
        }
    }

    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE_STATUS
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    #[must_use]
    pub const fn is_throttled(&self) -> bool {
        self.status_code == 429
    }

    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status_code >= 500 && self.status_code < 600
    }
}

/// Everything one run produced, handed to the caller once the run settled.
///
/// Records are in completion order; `relative_time` keeps issuance order.
#[derive(Debug, Clone, Serialize)]
pub struct TestRunResult {
    pub config: TestConfig,
    pub records: Vec<RequestRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "serde_secs")]
    pub elapsed: Duration,
    /// Requests handed to the dispatcher, including any abandoned ones.
    pub dispatched: u64,
    /// In-flight requests aborted at the end of the drain or on cancellation.
    pub abandoned: u64,
    /// True when the run was stopped from outside before it finished.
    pub cancelled: bool,
}

impl TestRunResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rate-limit headers the server sent during this run, recomputed from
    /// the records on every call.
    #[must_use]
    pub fn detect_rate_limit_headers(&self) -> DetectedHeaders {
        detect_rate_limit_headers(&self.records)
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        summarize(&self.records, self.elapsed)
    }
}
