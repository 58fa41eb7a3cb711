#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(rate) = ratelimit_tester::fuzzing::parse_rate_input(input) {
            debug_assert!(rate.is_finite() && rate > 0.0);
        }
    }
});
