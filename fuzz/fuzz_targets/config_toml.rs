#![no_main]

use libfuzzer_sys::fuzz_target;
use ratelimit_tester::config::types::ConfigFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let parsed: Option<ConfigFile> = toml::from_str(input).ok();
        let applied = ratelimit_tester::fuzzing::apply_config_from_toml(input);
        if applied.is_ok() {
            if let Some(config) = parsed {
                if let Some(rps) = config.rps {
                    debug_assert!(rps.is_finite() && rps > 0.0);
                }
                debug_assert!(config.requests != Some(0));
                if let Some(headers) = config.headers.as_ref() {
                    for header in headers {
                        debug_assert!(header.contains(':'));
                    }
                }
            }
        }
    }
});
