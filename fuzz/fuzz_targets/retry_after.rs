#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Some(delay) = ratelimit_tester::fuzzing::parse_retry_after_input(input) {
            if let Ok(seconds) = input.trim().parse::<u64>() {
                debug_assert_eq!(delay.as_secs(), seconds);
            }
        }
    }
});
