use std::time::Duration;

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("ratelimit-tester/", env!("CARGO_PKG_VERSION"));

/// Per-request I/O bound applied when neither CLI nor config set one.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config files picked up from the working directory when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_FILES: [&str; 2] =
    ["ratelimit-tester.toml", "ratelimit-tester.json"];
