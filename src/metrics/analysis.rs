//! Row-oriented payload handed to the external analyzer.
use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::domain::TestConfig;

use super::detector::DetectedHeaders;
use super::headers::ResponseHeaders;
use super::serde_secs;
use super::types::{RequestRecord, TestRunResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub status_code: u16,
    #[serde(with = "serde_secs")]
    pub latency: Duration,
    #[serde(with = "serde_secs")]
    pub relative_time: Duration,
    pub headers: ResponseHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&RequestRecord> for AnalysisRow {
    fn from(record: &RequestRecord) -> Self {
        Self {
            status_code: record.status_code,
            latency: record.latency,
            relative_time: record.relative_time,
            headers: record.headers.clone(),
            error: record.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInput {
    pub config: TestConfig,
    pub total_requests: u64,
    pub status_counts: BTreeMap<u16, u64>,
    #[serde(with = "serde_secs")]
    pub avg_latency: Duration,
    #[serde(with = "serde_secs")]
    pub max_latency: Duration,
    pub throttled_count: u64,
    #[serde(serialize_with = "serde_secs::serialize_opt")]
    pub first_throttle_time: Option<Duration>,
    pub detected_headers: DetectedHeaders,
    pub cancelled: bool,
    pub rows: Vec<AnalysisRow>,
}

impl TestRunResult {
    /// The records as analyzer rows, in completion order.
    #[must_use]
    pub fn rows(&self) -> Vec<AnalysisRow> {
        self.records.iter().map(AnalysisRow::from).collect()
    }

    #[must_use]
    pub fn analysis_input(&self) -> AnalysisInput {
        let summary = self.summary();
        AnalysisInput {
            config: self.config.clone(),
            total_requests: summary.total,
            status_counts: summary.status_counts,
            avg_latency: summary.avg_latency,
            max_latency: summary.max_latency,
            throttled_count: summary.throttled,
            first_throttle_time: summary.first_throttle_time,
            detected_headers: self.detect_rate_limit_headers(),
            cancelled: self.cancelled,
            rows: self.rows(),
        }
    }
}
