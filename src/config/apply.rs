use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, TesterArgs, parse_header};
use crate::error::{AppError, AppResult, ConfigError, ValidationError};

use super::types::{ConfigFile, DurationValue};

/// Applies configuration values to CLI arguments.
///
/// A value from the file is used only when the option was not given on the
/// command line or through its environment variable.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each
/// other.
pub fn apply_config(
    args: &mut TesterArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if config.data.is_some() && config.data_file.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "data",
            right: "data_file",
        }));
    }

    if !is_cli(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        args.headers = parse_headers(headers)?;
    }

    let body_on_cli = is_cli(matches, "data") || is_cli(matches, "data_file");
    if !body_on_cli {
        if let Some(data) = config.data.clone() {
            args.data = Some(data);
        }
        if let Some(data_file) = config.data_file.clone() {
            args.data_file = Some(data_file);
        }
    }

    if !is_cli(matches, "rps")
        && let Some(rps) = config.rps
    {
        args.rps = ensure_rate(rps)?;
    }

    if !is_cli(matches, "duration")
        && let Some(duration) = config.duration.as_ref()
    {
        args.duration = duration_field(duration, "duration")?;
    }

    if !is_cli(matches, "burst_size")
        && let Some(burst_size) = config.burst_size
    {
        args.burst_size = PositiveUsize::try_from(burst_size).map_err(|_err| {
            AppError::config(ConfigError::InvalidField {
                field: "burst_size",
                source: ValidationError::BurstSizeZero,
            })
        })?;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = duration_field(timeout, "timeout")?;
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = duration_field(timeout, "connect_timeout")?;
    }

    if !is_cli(matches, "drain_timeout")
        && let Some(timeout) = config.drain_timeout.as_ref()
    {
        args.drain_timeout = Some(duration_field(timeout, "drain_timeout")?);
    }

    if !is_cli(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = Some(PositiveU64::try_from(requests).map_err(|_err| {
            AppError::config(ConfigError::InvalidField {
                field: "requests",
                source: ValidationError::RequestBudgetZero,
            })
        })?);
    }

    if !is_cli(matches, "output_format")
        && let Some(format) = config.output_format
    {
        args.output_format = format;
    }

    if !is_cli(matches, "output")
        && let Some(output) = config.output.clone()
    {
        args.output = Some(output);
    }

    if !is_cli(matches, "export_csv")
        && let Some(path) = config.export_csv.clone()
    {
        args.export_csv = Some(path);
    }

    if !is_cli(matches, "export_json")
        && let Some(path) = config.export_json.clone()
    {
        args.export_json = Some(path);
    }

    if !is_cli(matches, "export_jsonl")
        && let Some(path) = config.export_jsonl.clone()
    {
        args.export_jsonl = Some(path);
    }

    if !is_cli(matches, "verbose")
        && let Some(verbose) = config.verbose
    {
        args.verbose = verbose;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    Ok(())
}

/// True when the user set the option explicitly, on the command line or
/// through its environment variable.
fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(headers.len());
    for header in headers {
        parsed.push(
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
        );
    }
    Ok(parsed)
}

fn ensure_rate(rps: f64) -> AppResult<f64> {
    if rps.is_finite() && rps > 0.0 {
        Ok(rps)
    } else {
        Err(AppError::config(ConfigError::InvalidField {
            field: "rps",
            source: ValidationError::RateNotPositive { value: rps },
        }))
    }
}

fn duration_field(value: &DurationValue, field: &'static str) -> AppResult<std::time::Duration> {
    value
        .to_duration()
        .map_err(|err| AppError::config(ConfigError::InvalidField { field, source: err }))
}
