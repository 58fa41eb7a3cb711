use std::path::PathBuf;

use crate::args::TesterArgs;
use crate::domain::TestConfig;
use crate::error::{AppError, AppResult, HttpError, ValidationError};

/// Turns parsed arguments (with any config file already applied) into a
/// validated [`TestConfig`].
///
/// # Errors
///
/// Returns an error when no URL was given, the body file cannot be read, or
/// the resulting config fails validation.
pub fn build_test_config(args: &TesterArgs) -> AppResult<TestConfig> {
    let url = args
        .url
        .clone()
        .ok_or_else(|| AppError::validation(ValidationError::MissingUrl))?;

    let body = match (args.data.as_ref(), args.data_file.as_ref()) {
        (Some(_), Some(_)) => {
            return Err(AppError::validation(ValidationError::DataAndDataFileConflict));
        }
        (Some(data), None) => Some(data.clone()),
        (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(|err| {
            AppError::http(HttpError::ReadBodyFile {
                path: PathBuf::from(path),
                source: err,
            })
        })?),
        (None, None) => None,
    };

    let mut config = TestConfig::new(url, args.rps, args.duration, args.burst_size.get());
    config.method = args.method;
    config.headers.clone_from(&args.headers);
    config.body = body;
    config.timeout = args.request_timeout;
    config.connect_timeout = args.connect_timeout;
    config.drain_timeout = args.drain_timeout;
    config.max_requests = args.requests.map(u64::from);

    config.validate()?;
    Ok(config)
}
