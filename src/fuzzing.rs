use std::time::Duration;

use chrono::Utc;
use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::parsers::parse_rate;
use crate::args::{PositiveU64, PositiveUsize, TesterArgs, parse_duration, parse_header};
use crate::config::apply_config;
use crate::config::types::ConfigFile;
use crate::error::{AppError, AppResult};
use crate::metrics::{
    DetectedHeaders, RateLimitSignals, RequestRecord, ResponseHeaders, detect_rate_limit_headers,
    parse_retry_after,
};

thread_local! {
    static BASE_MATCHES: ArgMatches = TesterArgs::command().get_matches_from(["ratelimit-tester"]);
}

/// Parses a header string in `Key: Value` format.
///
/// # Errors
///
/// Returns an error when the header is malformed.
pub fn parse_header_input(input: &str) -> AppResult<(String, String)> {
    parse_header(input).map_err(AppError::from)
}

/// Parses a duration argument (e.g. `10s`, `500ms`).
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_input(input: &str) -> AppResult<Duration> {
    parse_duration(input).map_err(AppError::from)
}

/// Parses a requests-per-second value.
///
/// # Errors
///
/// Returns an error when the rate is not a positive finite number.
pub fn parse_rate_input(input: &str) -> AppResult<f64> {
    parse_rate(input)
}

/// Parses a positive u64 string value.
///
/// # Errors
///
/// Returns an error when the value is invalid or zero.
pub fn parse_positive_u64_input(input: &str) -> AppResult<u64> {
    let value: PositiveU64 = input.parse()?;
    Ok(value.get())
}

/// Parses a positive usize string value.
///
/// # Errors
///
/// Returns an error when the value is invalid or zero.
pub fn parse_positive_usize_input(input: &str) -> AppResult<usize> {
    let value: PositiveUsize = input.parse()?;
    Ok(value.get())
}

/// Parses TOML config and applies it to defaults.
///
/// # Errors
///
/// Returns an error when parsing or validation fails.
pub fn apply_config_from_toml(input: &str) -> AppResult<()> {
    let config: ConfigFile = toml::from_str(input)?;
    apply_config_to_defaults(&config)
}

/// Parses JSON config and applies it to defaults.
///
/// # Errors
///
/// Returns an error when parsing or validation fails.
pub fn apply_config_from_json(input: &[u8]) -> AppResult<()> {
    let config: ConfigFile = serde_json::from_slice(input)?;
    apply_config_to_defaults(&config)
}

/// Loads a config file from disk to exercise extension handling.
///
/// # Errors
///
/// Returns an error when the config file cannot be read or parsed.
pub fn load_config_file_input(path: &std::path::Path) -> AppResult<()> {
    crate::config::load_config_file(path).map(|_| ())
}

/// Builds one record per `(relative_millis, name, value)` entry and runs
/// header detection over them.
#[must_use]
pub fn detect_headers_input(entries: &[(u16, String, String)]) -> DetectedHeaders {
    let records: Vec<RequestRecord> = entries
        .iter()
        .map(|(relative_millis, name, value)| {
            let mut headers = ResponseHeaders::new();
            headers.insert(name, value.clone());
            RequestRecord::response(
                200,
                Duration::ZERO,
                Duration::from_millis(u64::from(*relative_millis)),
                headers,
            )
        })
        .collect();
    detect_rate_limit_headers(&records)
}

/// Interprets a `Retry-After` value against the current time.
#[must_use]
pub fn parse_retry_after_input(input: &str) -> Option<Duration> {
    parse_retry_after(input, Utc::now())
}

/// Interprets a detected header map.
#[must_use]
pub fn rate_limit_signals_input(detected: &DetectedHeaders) -> RateLimitSignals {
    RateLimitSignals::from_detected(detected, Utc::now())
}

fn apply_config_to_defaults(config: &ConfigFile) -> AppResult<()> {
    BASE_MATCHES.with(|matches| {
        let mut args = TesterArgs::from_arg_matches(matches)?;
        apply_config(&mut args, matches, config)
    })
}
