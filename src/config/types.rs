use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, OutputFormat, parse_duration};
use crate::error::ValidationError;

/// On-disk run configuration. Every field is optional; values only fill in
/// what the command line left unset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    /// `Key: Value` strings, like `--header`.
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub data_file: Option<String>,
    pub rps: Option<f64>,
    pub duration: Option<DurationValue>,
    pub burst_size: Option<usize>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub drain_timeout: Option<DurationValue>,
    pub requests: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub output: Option<String>,
    pub export_csv: Option<String>,
    pub export_json: Option<String>,
    pub export_jsonl: Option<String>,
    pub verbose: Option<bool>,
    pub no_color: Option<bool>,
}

/// A duration written either as whole seconds or as text with a unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(0) => Err(ValidationError::DurationZero),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}
