use std::time::Duration;

use chrono::{DateTime, Utc};
use ratelimit_tester::TestConfig;
use ratelimit_tester::error::{AppError, AppResult, MetricsError};
use ratelimit_tester::metrics::{
    DetectedHeaders, RequestRecord, RunSummary, TestRunResult, serde_secs,
};
use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};

const CSV_HEADER: [&str; 4] = ["relative_time", "latency", "status_code", "error"];

/// One row per record: `relative_time,latency,status_code,error`, times in
/// seconds.
pub(crate) fn render_csv(result: &TestRunResult) -> AppResult<Vec<u8>> {
    let csv_error = |err: csv::Error| {
        AppError::metrics(MetricsError::Csv {
            context: "csv export",
            source: err,
        })
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for record in &result.records {
        writer
            .write_record([
                format!("{:.6}", record.relative_time.as_secs_f64()),
                format!("{:.6}", record.latency.as_secs_f64()),
                record.status_code.to_string(),
                record.error.clone().unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    writer.into_inner().map_err(|err| {
        AppError::metrics(MetricsError::Io {
            context: "csv export",
            source: err.into_error(),
        })
    })
}

/// The analyzer payload, pretty-printed.
pub(crate) fn render_json(result: &TestRunResult) -> AppResult<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(&result.analysis_input()).map_err(|err| {
        AppError::metrics(MetricsError::Serialize {
            context: "json export",
            source: err,
        })
    })?;
    json.push(b'\n');
    Ok(json)
}

/// A summary line followed by one line per record.
pub(crate) fn render_jsonl(result: &TestRunResult) -> AppResult<Vec<u8>> {
    let summary = JsonlLine::Summary {
        started_at: result.started_at,
        elapsed: result.elapsed,
        dispatched: result.dispatched,
        abandoned: result.abandoned,
        cancelled: result.cancelled,
        config: &result.config,
        summary: result.summary(),
        detected_headers: result.detect_rate_limit_headers(),
    };
    let mut out = Vec::new();
    for line in std::iter::once(summary).chain(result.records.iter().map(JsonlLine::Record)) {
        serde_json::to_writer(&mut out, &line).map_err(|err| {
            AppError::metrics(MetricsError::Serialize {
                context: "jsonl export",
                source: err,
            })
        })?;
        out.push(b'\n');
    }
    Ok(out)
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonlLine<'a> {
    Summary {
        started_at: DateTime<Utc>,
        #[serde(with = "serde_secs")]
        elapsed: Duration,
        dispatched: u64,
        abandoned: u64,
        cancelled: bool,
        config: &'a TestConfig,
        summary: RunSummary,
        detected_headers: DetectedHeaders,
    },
    Record(&'a RequestRecord),
}

pub(crate) async fn write_file(path: &str, bytes: &[u8]) -> AppResult<()> {
    let write = async {
        let file = tokio::fs::File::create(path).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).await?;
        writer.flush().await
    };
    write.await.map_err(|err| {
        AppError::metrics(MetricsError::Io {
            context: "writing output file",
            source: err,
        })
    })
}

pub(crate) async fn write_stdout(bytes: &[u8]) -> AppResult<()> {
    let mut stdout = tokio::io::stdout();
    let write = async {
        stdout.write_all(bytes).await?;
        stdout.flush().await
    };
    write.await.map_err(|err| {
        AppError::metrics(MetricsError::Io {
            context: "writing to stdout",
            source: err,
        })
    })
}
