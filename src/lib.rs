//! Core library for the `ratelimit-tester` CLI.
//!
//! A run sends requests at a controlled rate, in fixed-size bursts, against
//! one HTTP endpoint. Every outcome, including transport failures, is kept as
//! a [`metrics::RequestRecord`]; the rate-limit headers the server sent back
//! are derived from those records on demand.
//!
//! ```no_run
//! # async fn probe() -> ratelimit_tester::error::AppResult<()> {
//! use std::time::Duration;
//! use ratelimit_tester::{TestConfig, run_test};
//!
//! let config = TestConfig::new("http://127.0.0.1:8080/api", 10.0, Duration::from_secs(5), 5);
//! let result = run_test(&config).await?;
//! for (name, value) in result.detect_rate_limit_headers().iter() {
//!     println!("{name}: {value}");
//! }
//! # Ok(())
//! # }
//! ```
pub mod args;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod metrics;
pub mod shutdown;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;

pub use domain::TestConfig;
pub use http::{RunHooks, run_test, run_test_with};
pub use metrics::{DetectedHeaders, RequestRecord, TestRunResult, detect_rate_limit_headers};
