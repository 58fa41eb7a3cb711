#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut entries = Vec::new();
    for (index, line) in text.lines().take(64).enumerate() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let relative = u16::try_from(index % 7).unwrap_or(0);
        entries.push((relative, name.trim().to_owned(), value.trim().to_owned()));
    }

    let detected = ratelimit_tester::fuzzing::detect_headers_input(&entries);
    for (name, _) in detected.iter() {
        debug_assert_eq!(name, name.to_ascii_lowercase());
        debug_assert!(ratelimit_tester::metrics::is_rate_limit_header(name));
    }
    let again = ratelimit_tester::fuzzing::detect_headers_input(&entries);
    debug_assert_eq!(detected, again);
    let _signals = ratelimit_tester::fuzzing::rate_limit_signals_input(&detected);
});
