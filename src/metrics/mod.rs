//! Per-request records, their collection, and everything derived from them.
mod analysis;
mod collector;
mod detector;
mod headers;
mod histogram;
mod progress;
pub mod serde_secs;
mod summary;
mod types;


pub use analysis::{AnalysisInput, AnalysisRow};
pub use collector::{Collector, RecordSink, setup_record_collector};
pub use detector::{
    DetectedHeaders, RateLimitHeaderFold, RateLimitSignals, detect_rate_limit_headers,
    is_rate_limit_header, parse_retry_after,
};
pub use headers::ResponseHeaders;
pub use histogram::LatencyHistogram;
pub use progress::{ProgressPublisher, RunPhase, RunSnapshot};
pub use summary::{RunSummary, summarize};
pub use types::{RequestRecord, TRANSPORT_FAILURE_STATUS, TestRunResult};
