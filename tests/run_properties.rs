
use std::future::Future;
use std::time::Duration;

use ratelimit_tester::{TestConfig, run_test};
use support_server::{Behavior, closed_port_url, spawn_http_server};

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

#[test]
fn dispatch_count_stays_within_one_burst_of_target() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let config = TestConfig::new(url, 20.0, Duration::from_secs(1), 3);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;

        // interval 0.15s: offsets 0.00..0.90 give 7 bursts of 3.
        let ceiling = 7 * 3;
        let target = 20;
        let dispatched = result.dispatched;
        if dispatched > ceiling {
            return Err(format!("Dispatched {} > ceiling {}", dispatched, ceiling));
        }
        if dispatched.abs_diff(target) > 3 {
            return Err(format!("Dispatched {} not within one burst of {}", dispatched, target));
        }
        if u64::try_from(result.len()).unwrap_or(u64::MAX) != dispatched {
            return Err(format!("{} records for {} dispatched", result.len(), dispatched));
        }
        Ok(())
    })
}

#[test]
fn relative_times_stay_inside_duration_plus_timeout() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let mut config = TestConfig::new(url, 8.0, Duration::from_millis(800), 2);
        config.timeout = Duration::from_secs(2);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        let bound = config.duration + config.timeout;
        if let Some(record) = result.records.iter().find(|record| record.relative_time > bound) {
            return Err(format!("Record issued at {:?} past {:?}", record.relative_time, bound));
        }
        Ok(())
    })
}

#[test]
fn always_ok_target_yields_responses_with_headers() -> Result<(), String> {
    let (url, server) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let config = TestConfig::new(url, 10.0, Duration::from_millis(500), 2);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        if result.is_empty() {
            return Err("Expected records".to_owned());
        }
        if result.records.iter().any(|record| record.status_code != 200) {
            return Err(format!("Expected only 200s: {:?}", result.summary().status_counts));
        }
        if result.records.iter().any(|record| record.headers.is_empty()) {
            return Err("Every response should carry headers".to_owned());
        }
        if server.hits() < u64::try_from(result.len()).unwrap_or(u64::MAX) {
            return Err("Server saw fewer requests than were recorded".to_owned());
        }
        let detected = result.detect_rate_limit_headers();
        if detected.get("x-ratelimit-limit") != Some("1000") {
            return Err(format!("Missing limit header: {:?}", detected));
        }
        Ok(())
    })
}

#[test]
fn retry_after_from_a_429_is_detected() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::ThrottleEveryThird)?;
    run_async_test(async move {
        let config = TestConfig::new(url, 12.0, Duration::from_millis(500), 3);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        let summary = result.summary();
        if summary.throttled == 0 {
            return Err(format!("Expected a 429: {:?}", summary.status_counts));
        }
        let detected = result.detect_rate_limit_headers();
        if detected.get("Retry-After") != Some("10") || detected.len() != 1 {
            return Err(format!("Unexpected detection: {:?}", detected));
        }
        if summary.first_throttle_time.is_none() {
            return Err("Expected a first throttle time".to_owned());
        }
        Ok(())
    })
}

#[test]
fn separate_runs_do_not_share_detection_state() -> Result<(), String> {
    let (throttled_url, _throttled) = spawn_http_server(Behavior::ThrottleEveryThird)?;
    let (ok_url, _ok) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let first = run_test(&TestConfig::new(throttled_url, 12.0, Duration::from_millis(500), 3))
            .await
            .map_err(|err| err.to_string())?;
        let second = run_test(&TestConfig::new(ok_url, 12.0, Duration::from_millis(500), 3))
            .await
            .map_err(|err| err.to_string())?;

        if first.detect_rate_limit_headers().get("retry-after").is_none() {
            return Err("First run should see Retry-After".to_owned());
        }
        if second.detect_rate_limit_headers().get("retry-after").is_some() {
            return Err("Retry-After leaked into the second run".to_owned());
        }
        Ok(())
    })
}

#[test]
fn bursts_arrive_grouped() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let config = TestConfig::new(url, 10.0, Duration::from_secs(1), 5);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        if result.len() != 10 {
            return Err(format!("Expected 10 records, got {}", result.len()));
        }
        let mut offsets: Vec<Duration> = result
            .records
            .iter()
            .map(|record| record.relative_time)
            .collect();
        offsets.sort();
        offsets.dedup();
        if offsets.len() != 2 {
            return Err(format!("Expected two release instants, got {:?}", offsets));
        }
        let gap = offsets
            .last()
            .zip(offsets.first())
            .map(|(last, first)| last.saturating_sub(*first))
            .unwrap_or_default();
        if gap < Duration::from_millis(400) || gap > Duration::from_millis(700) {
            return Err(format!("Bursts should be about 0.5s apart, got {:?}", gap));
        }
        Ok(())
    })
}

#[test]
fn hanging_requests_settle_as_timeouts_before_the_drain_ends() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Hang)?;
    run_async_test(async move {
        let mut config = TestConfig::new(url, 10.0, Duration::from_millis(300), 2);
        config.timeout = Duration::from_millis(300);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;

        if result.dispatched != 4 {
            return Err(format!("Expected 4 dispatches, got {}", result.dispatched));
        }
        if result.abandoned != 0 || result.len() != 4 {
            return Err(format!(
                "Expected every dispatch recorded, got {} records and {} abandoned",
                result.len(),
                result.abandoned
            ));
        }
        let bound = config.duration + config.timeout;
        for record in &result.records {
            if record.status_code != 0 || !record.timed_out {
                return Err(format!("Expected a timeout record, got {:?}", record));
            }
            if record.relative_time > bound {
                return Err(format!("Record issued at {:?} past {:?}", record.relative_time, bound));
            }
        }
        if result.summary().timeouts != 4 {
            return Err(format!("Expected 4 timeouts in the summary: {:?}", result.summary()));
        }
        Ok(())
    })
}

#[test]
fn dropped_connections_become_transport_failures() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::DropConnection)?;
    run_async_test(async move {
        let config = TestConfig::new(url, 10.0, Duration::from_millis(300), 2);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        if result.is_empty() {
            return Err("Expected records".to_owned());
        }
        for record in &result.records {
            if record.status_code != 0 || record.error.as_deref().is_none_or(str::is_empty) {
                return Err(format!("Expected a transport failure, got {:?}", record));
            }
        }
        Ok(())
    })
}

#[test]
fn refused_connections_become_transport_failures() -> Result<(), String> {
    let url = closed_port_url()?;
    run_async_test(async move {
        let config = TestConfig::new(url, 5.0, Duration::from_millis(200), 1);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;
        if result.summary().transport_failures != u64::try_from(result.len()).unwrap_or(0) {
            return Err("Expected only transport failures".to_owned());
        }
        Ok(())
    })
}

#[test]
fn degenerate_configs_fail_before_any_request() -> Result<(), String> {
    let (url, server) = spawn_http_server(Behavior::Ok)?;
    run_async_test(async move {
        let cases = [
            TestConfig::new(url.clone(), 10.0, Duration::ZERO, 1),
            TestConfig::new(url.clone(), 0.0, Duration::from_secs(1), 1),
            TestConfig::new(url.clone(), 10.0, Duration::from_secs(1), 0),
        ];
        for config in &cases {
            match run_test(config).await {
                Err(err) if err.is_validation() => {}
                Err(err) => return Err(format!("Expected a validation error, got {}", err)),
                Ok(_) => return Err(format!("Expected rejection of {:?}", config)),
            }
        }
        Ok(())
    })?;
    if server.hits() != 0 {
        return Err(format!("Server saw {} requests", server.hits()));
    }
    Ok(())
}
