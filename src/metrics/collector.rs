use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::error::{AppResult, MetricsError};

use super::detector::RateLimitHeaderFold;
use super::histogram::LatencyHistogram;
use super::progress::ProgressPublisher;
use super::types::RequestRecord;

const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Concurrency-safe append handle. Cloned into every in-flight dispatch.
#[derive(Debug, Clone)]
pub struct RecordSink {
    tx: mpsc::UnboundedSender<RequestRecord>,
}

impl RecordSink {
    /// Hands one record to the collector. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector task has already stopped.
    pub fn add(&self, record: RequestRecord) -> Result<(), MetricsError> {
        self.tx
            .send(record)
            .map_err(|_send_error| MetricsError::CollectorStopped)
    }
}

/// Owner side of the collector task.
#[derive(Debug)]
pub struct Collector {
    handle: JoinHandle<Vec<RequestRecord>>,
}

impl Collector {
    /// Waits for every [`RecordSink`] to be dropped and returns the records
    /// in completion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector task panicked or was cancelled.
    pub async fn finalize(self) -> AppResult<Vec<RequestRecord>> {
        Ok(self.handle.await?)
    }
}

struct CollectorState {
    records: Vec<RequestRecord>,
    headers: RateLimitHeaderFold,
    headers_changed: bool,
    histogram: Option<LatencyHistogram>,
    transport_failures: u64,
    throttled: u64,
    pending: bool,
}

impl CollectorState {
    fn new() -> Self {
        let histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                tracing::warn!("Failed to initialize latency histogram: {}", err);
                None
            }
        };
        Self {
            records: Vec::new(),
            headers: RateLimitHeaderFold::default(),
            headers_changed: false,
            histogram,
            transport_failures: 0,
            throttled: 0,
            pending: false,
        }
    }

    fn push(&mut self, record: RequestRecord) {
        if record.is_transport_failure() {
            self.transport_failures = self.transport_failures.saturating_add(1);
        }
        if record.is_throttled() {
            self.throttled = self.throttled.saturating_add(1);
        }
        if self.headers.observe(&record) {
            self.headers_changed = true;
        }
        if let Some(histogram) = self.histogram.as_mut()
            && let Err(err) = histogram.record(record.latency)
        {
            tracing::debug!("Dropping latency sample: {}", err);
        }
        self.records.push(record);
        self.pending = true;
    }

    fn publish(&mut self, progress: &ProgressPublisher, run_start: Instant) {
        if !self.pending {
            return;
        }
        let (p50, p90, p99) = self
            .histogram
            .as_ref()
            .map(LatencyHistogram::percentiles)
            .unwrap_or_default();
        let detected = self
            .headers_changed
            .then(|| self.headers.detected());
        let completed = u64::try_from(self.records.len()).unwrap_or(u64::MAX);
        let transport_failures = self.transport_failures;
        let throttled = self.throttled;
        progress.update(|snapshot| {
            snapshot.elapsed = run_start.elapsed();
            snapshot.completed = completed;
            snapshot.transport_failures = transport_failures;
            snapshot.throttled = throttled;
            snapshot.p50 = p50;
            snapshot.p90 = p90;
            snapshot.p99 = p99;
            if let Some(detected) = detected {
                snapshot.detected_headers = detected;
            }
        });
        self.headers_changed = false;
        self.pending = false;
    }
}

/// Spawns the collector task.
///
/// The task is the only owner of the record list. It keeps running until the
/// last [`RecordSink`] clone is dropped, so every record sent before that
/// point is part of the finalized result.
#[must_use]
pub fn setup_record_collector(
    progress: ProgressPublisher,
    run_start: Instant,
) -> (RecordSink, Collector) {
    let (tx, mut rx) = mpsc::unbounded_channel::<RequestRecord>();

    let handle = tokio::spawn(async move {
        let mut state = CollectorState::new();
        let mut progress_interval = tokio::time::interval(PROGRESS_UPDATE_INTERVAL);
        progress_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_record = rx.recv() => {
                    match maybe_record {
                        Some(record) => state.push(record),
                        None => break,
                    }
                }
                _ = progress_interval.tick() => {
                    state.publish(&progress, run_start);
                }
            }
        }

        state.publish(&progress, run_start);
        tracing::debug!("Record collector finished with {} records", state.records.len());
        state.records
    });

    (RecordSink { tx }, Collector { handle })
}
