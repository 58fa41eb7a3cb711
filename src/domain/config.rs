use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::args::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT, HttpMethod,
};
use crate::error::ValidationError;

const BURST_COUNT_PRECISION: f64 = 1_000_000.0;

/// Immutable description of one rate-limit test run.
///
/// A `TestConfig` is validated once, before the first request leaves the
/// process, and is read-only for the rest of the run.
#[derive(Debug, Clone, Serialize)]
pub struct TestConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Target sustained requests per second.
    pub rps: f64,
    /// Nominal run length; no burst is released once it has elapsed.
    #[serde(serialize_with = "crate::metrics::serde_secs::serialize")]
    pub duration: Duration,
    /// Requests released concurrently per tick.
    pub burst_size: usize,
    #[serde(serialize_with = "crate::metrics::serde_secs::serialize")]
    pub timeout: Duration,
    #[serde(serialize_with = "crate::metrics::serde_secs::serialize")]
    pub connect_timeout: Duration,
    #[serde(serialize_with = "crate::metrics::serde_secs::serialize_opt")]
    pub drain_timeout: Option<Duration>,
    pub max_requests: Option<u64>,
    pub user_agent: Option<String>,
}

impl TestConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, rps: f64, duration: Duration, burst_size: usize) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            rps,
            duration,
            burst_size,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            drain_timeout: None,
            max_requests: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_owned()),
        }
    }

    /// Checks every invariant a run depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: non-positive or non-finite
    /// `rps`, zero `duration`, zero `burst_size`, a URL that is not an
    /// absolute http(s) URL, malformed headers, a zero timeout, or a zero
    /// request budget.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.rps.is_finite() || self.rps <= 0.0 {
            return Err(ValidationError::RateNotPositive { value: self.rps });
        }
        if self.duration.is_zero() {
            return Err(ValidationError::DurationZero);
        }
        if self.burst_size == 0 {
            return Err(ValidationError::BurstSizeZero);
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ValidationError::TimeoutZero);
        }
        if self.max_requests == Some(0) {
            return Err(ValidationError::RequestBudgetZero);
        }
        self.parsed_url()?;
        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }
        self.checked_tick_interval()?;
        Ok(())
    }

    /// Parses `url` as an absolute http(s) URL with a host.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable URLs, other schemes, or a missing host.
    pub fn parsed_url(&self) -> Result<Url, ValidationError> {
        let url = Url::parse(&self.url).map_err(|err| ValidationError::InvalidUrl {
            url: self.url.clone(),
            source: err,
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ValidationError::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::UrlMissingHost);
        }
        Ok(url)
    }

    /// Spacing between bursts: `burst_size / rps` seconds.
    ///
    /// Only meaningful on a validated config; an out-of-range interval
    /// collapses to zero.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.checked_tick_interval().unwrap_or(Duration::ZERO)
    }

    fn checked_tick_interval(&self) -> Result<Duration, ValidationError> {
        let burst = self.burst_size as f64;
        Duration::try_from_secs_f64(burst / self.rps).map_err(|_err| {
            ValidationError::TickIntervalOutOfRange {
                burst_size: self.burst_size,
                rps: self.rps,
            }
        })
    }

    /// Bursts a run releases: `ceil(rps * duration / burst_size)`, never less
    /// than one. Counted from the rate, not from the nanosecond-truncated
    /// [`Self::tick_interval`].
    #[must_use]
    pub fn max_bursts(&self) -> u64 {
        if self.tick_interval().is_zero() {
            return 1;
        }
        let burst = self.burst_size as f64;
        let exact = self.rps * self.duration.as_secs_f64() / burst;
        // Rounded first so float noise such as 2.0000000000000004 stays 2.
        let bursts = ((exact * BURST_COUNT_PRECISION).round() / BURST_COUNT_PRECISION).ceil();
        if bursts.is_finite() && bursts >= 1.0 {
            bursts as u64
        } else {
            1
        }
    }

    /// Upper bound on requests a run can dispatch, including the request budget.
    #[must_use]
    pub fn max_dispatches(&self) -> u64 {
        let burst = u64::try_from(self.burst_size).unwrap_or(u64::MAX);
        let scheduled = self.max_bursts().saturating_mul(burst);
        self.max_requests
            .map_or(scheduled, |budget| budget.min(scheduled))
    }

    /// How long in-flight requests may run after the nominal duration.
    #[must_use]
    pub fn drain_allowance(&self) -> Duration {
        self.drain_timeout.unwrap_or(self.timeout)
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), ValidationError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
        ValidationError::InvalidHeaderName {
            header: name.to_owned(),
            source: err,
        }
    })?;
    HeaderValue::from_str(value).map_err(|err| ValidationError::InvalidHeaderValue {
        header: name.to_owned(),
        source: err,
    })?;
    Ok(())
}
