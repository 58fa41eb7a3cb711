#![no_main]

use libfuzzer_sys::fuzz_target;
use ratelimit_tester::config::types::ConfigFile;

fuzz_target!(|data: &[u8]| {
    let parsed: Option<ConfigFile> = serde_json::from_slice(data).ok();
    let applied = ratelimit_tester::fuzzing::apply_config_from_json(data);
    if applied.is_ok() {
        if let Some(config) = parsed {
            if let Some(rps) = config.rps {
                debug_assert!(rps.is_finite() && rps > 0.0);
            }
            debug_assert!(config.burst_size != Some(0));
            debug_assert!(!(config.data.is_some() && config.data_file.is_some()));
        }
    }
});
