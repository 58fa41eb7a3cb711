use clap::Parser;
use std::time::Duration;

use super::parsers::{
    parse_duration_arg, parse_header, parse_positive_u64, parse_positive_usize, parse_rate,
};
use super::types::{HttpMethod, OutputFormat, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP rate-limit prober - sends bursts at a controlled rate, absorbs failures as data, and reports the throttling signals a server sends back.",
    next_help_heading = "Advanced Options"
)]
pub struct TesterArgs {
    /// Target URL to probe
    #[arg(long, short, help_heading = "Common Options")]
    pub url: Option<String>,

    /// HTTP method to use
    #[arg(
        long,
        short = 'X',
        default_value = "get",
        ignore_case = true,
        help_heading = "Common Options"
    )]
    pub method: HttpMethod,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header, help_heading = "Common Options")]
    pub headers: Vec<(String, String)>,

    /// Request body data
    #[arg(long, short, conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Request body read from a file
    #[arg(long = "data-file", short = 'D', conflicts_with = "data")]
    pub data_file: Option<String>,

    /// Target sustained request rate (requests per second, fractions allowed)
    #[arg(
        long,
        short = 'r',
        default_value = "10",
        value_parser = parse_rate,
        help_heading = "Common Options"
    )]
    pub rps: f64,

    /// Nominal run length (supports ms/s/m/h, bare numbers are seconds)
    #[arg(
        long = "duration",
        short = 't',
        default_value = "10s",
        value_parser = parse_duration_arg,
        help_heading = "Common Options"
    )]
    pub duration: Duration,

    /// Requests released concurrently at each scheduling tick
    #[arg(
        long = "burst-size",
        short = 'b',
        default_value = "1",
        value_parser = parse_positive_usize,
        help_heading = "Common Options"
    )]
    pub burst_size: PositiveUsize,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "30s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Timeout for establishing a new connection (supports ms/s/m/h)
    #[arg(
        long = "connect-timeout",
        default_value = "10s",
        value_parser = parse_duration_arg
    )]
    pub connect_timeout: Duration,

    /// How long to wait for in-flight requests once the duration elapsed (defaults to --timeout)
    #[arg(long = "drain-timeout", value_parser = parse_duration_arg)]
    pub drain_timeout: Option<Duration>,

    /// Stop issuing after N total requests
    #[arg(long = "requests", value_parser = parse_positive_u64)]
    pub requests: Option<PositiveU64>,

    /// Path to config file (TOML/JSON). Defaults to ./ratelimit-tester.toml or ./ratelimit-tester.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Output format for the run result
    #[arg(long = "output-format", default_value = "text", value_enum)]
    pub output_format: OutputFormat,

    /// Write the formatted result to this path instead of stdout
    #[arg(long = "output", short = 'o')]
    pub output: Option<String>,

    /// Export per-request records to CSV
    #[arg(long = "export-csv")]
    pub export_csv: Option<String>,

    /// Export the analysis payload (summary, detected headers, rows) to JSON
    #[arg(long = "export-json")]
    pub export_json: Option<String>,

    /// Export summary and records as newline-delimited JSON
    #[arg(long = "export-jsonl")]
    pub export_jsonl: Option<String>,

    /// Enable verbose logging (sets log level to debug unless overridden by RATELIMIT_TESTER_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color", env = "NO_COLOR")]
    pub no_color: bool,
}
