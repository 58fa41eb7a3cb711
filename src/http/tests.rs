use super::*;
use crate::domain::TestConfig;
use crate::error::AppError;
use crate::metrics::{RunPhase, RunSnapshot};
use crate::shutdown::shutdown_channel;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// URL of a local port nothing listens on.
fn closed_port_url() -> Result<String, String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("local_addr failed: {}", err))?;
    drop(listener);
    Ok(format!("http://{}/", addr))
}

#[test]
fn schedule_offsets_follow_absolute_timeline() -> Result<(), String> {
    let config = TestConfig::new("http://localhost/", 10.0, Duration::from_secs(1), 5);
    let schedule = BurstSchedule::from_config(&config);

    if schedule.interval() != Duration::from_millis(500) {
        return Err(format!("Unexpected interval {:?}", schedule.interval()));
    }
    if schedule.offset(0) != Some(Duration::ZERO) {
        return Err("Burst zero must be due at the start".to_owned());
    }
    if schedule.offset(1) != Some(Duration::from_millis(500)) {
        return Err("Burst one must be due at 500ms".to_owned());
    }
    if schedule.offset(2).is_some() {
        return Err("No burst may be due at the nominal duration".to_owned());
    }

    let start = Instant::now();
    if schedule.deadline(start, 1) != start.checked_add(Duration::from_millis(500)) {
        return Err("Deadline must be anchored to the start".to_owned());
    }
    Ok(())
}

#[test]
fn schedule_issues_one_burst_when_duration_is_shorter_than_interval() -> Result<(), String> {
    let config = TestConfig::new("http://localhost/", 1.0, Duration::from_millis(200), 5);
    let schedule = BurstSchedule::from_config(&config);

    if schedule.offset(0).is_none() || schedule.offset(1).is_some() {
        return Err("Expected exactly one burst".to_owned());
    }
    if schedule.burst_len(0) != 5 {
        return Err(format!("Expected a full burst, got {}", schedule.burst_len(0)));
    }
    if schedule.burst_len(5) != 0 {
        return Err("Expected nothing after the single burst".to_owned());
    }
    Ok(())
}

#[test]
fn schedule_stops_before_duration_for_inexact_rates() -> Result<(), String> {
    let config = TestConfig::new("http://localhost/", 3.0, Duration::from_secs(1), 1);
    let schedule = BurstSchedule::from_config(&config);

    let due: Vec<u64> = (0..5).filter(|index| schedule.offset(*index).is_some()).collect();
    if due != [0, 1, 2] {
        return Err(format!("Expected bursts 0..3 to be due, got {:?}", due));
    }
    let last = schedule.offset(2).unwrap_or_default();
    if last < Duration::from_millis(666) || last > Duration::from_millis(667) {
        return Err(format!("Unexpected offset for burst 2: {:?}", last));
    }
    Ok(())
}

#[test]
fn schedule_respects_request_budget() -> Result<(), String> {
    let mut config = TestConfig::new("http://localhost/", 100.0, Duration::from_secs(1), 4);
    config.max_requests = Some(6);
    let schedule = BurstSchedule::from_config(&config);

    let lens = [
        schedule.burst_len(0),
        schedule.burst_len(4),
        schedule.burst_len(6),
    ];
    if lens != [4, 2, 0] {
        return Err(format!("Unexpected burst lengths {:?}", lens));
    }
    Ok(())
}

#[test]
fn request_template_carries_method_headers_and_body() -> Result<(), String> {
    let mut config = TestConfig::new("http://localhost:8080/items", 1.0, Duration::from_secs(1), 1);
    config.method = crate::args::HttpMethod::Post;
    config.headers = vec![
        ("X-Api-Key".to_owned(), "secret".to_owned()),
        ("Accept".to_owned(), "application/json".to_owned()),
    ];
    config.body = Some("{\"name\":\"probe\"}".to_owned());

    let client = build_client(&config).map_err(|err| err.to_string())?;
    let template = RequestTemplate::new(&client, &config).map_err(|err| err.to_string())?;
    let request = template.instantiate().map_err(|err| err.to_string())?;

    if *request.method() != reqwest::Method::POST {
        return Err(format!("Unexpected method {}", request.method()));
    }
    if request.url().as_str() != "http://localhost:8080/items" {
        return Err(format!("Unexpected url {}", request.url()));
    }
    if request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        != Some("secret")
    {
        return Err("Expected X-Api-Key header".to_owned());
    }
    let body = request
        .body()
        .and_then(reqwest::Body::as_bytes)
        .ok_or_else(|| "Expected an in-memory body".to_owned())?;
    if body != b"{\"name\":\"probe\"}" {
        return Err("Unexpected body".to_owned());
    }
    Ok(())
}

#[test]
fn request_template_rejects_bad_header() -> Result<(), String> {
    let mut config = TestConfig::new("http://localhost/", 1.0, Duration::from_secs(1), 1);
    config.headers = vec![("bad header".to_owned(), "value".to_owned())];
    let client = build_client(&config).map_err(|err| err.to_string())?;
    match RequestTemplate::new(&client, &config) {
        Err(err) if err.is_validation() => Ok(()),
        Err(err) => Err(format!("Expected validation error, got {}", err)),
        Ok(_) => Err("Expected header to be rejected".to_owned()),
    }
}

#[test]
fn dispatch_records_connection_refused_as_transport_failure() -> Result<(), String> {
    run_async_test(async {
        let config = TestConfig::new(closed_port_url()?, 1.0, Duration::from_secs(1), 1);
        let client = build_client(&config).map_err(|err| err.to_string())?;
        let template = RequestTemplate::new(&client, &config).map_err(|err| err.to_string())?;
        let request = template.instantiate().map_err(|err| err.to_string())?;

        let deadline = Instant::now() + Duration::from_secs(5);
        let record = dispatch(&client, request, Duration::from_millis(3), deadline).await;
        if record.status_code != 0 {
            return Err(format!("Expected status 0, got {}", record.status_code));
        }
        if record.error.as_deref().is_none_or(str::is_empty) {
            return Err("Expected a descriptive error".to_owned());
        }
        if !record.headers.is_empty() {
            return Err("Expected no headers on failure".to_owned());
        }
        if record.relative_time != Duration::from_millis(3) {
            return Err("Expected relative_time to be kept".to_owned());
        }
        Ok(())
    })
}

#[test]
fn dispatch_settles_as_timeout_at_its_deadline() -> Result<(), String> {
    run_async_test(async {
        // Connections complete in the backlog but nothing ever answers.
        let silent = std::net::TcpListener::bind("127.0.0.1:0")
            .map_err(|err| format!("bind failed: {}", err))?;
        let addr = silent
            .local_addr()
            .map_err(|err| format!("local_addr failed: {}", err))?;
        let config = TestConfig::new(format!("http://{}/", addr), 1.0, Duration::from_secs(1), 1);
        let client = build_client(&config).map_err(|err| err.to_string())?;
        let template = RequestTemplate::new(&client, &config).map_err(|err| err.to_string())?;
        let request = template.instantiate().map_err(|err| err.to_string())?;

        let deadline = Instant::now() + Duration::from_millis(200);
        let record = dispatch(&client, request, Duration::ZERO, deadline).await;
        drop(silent);

        if record.status_code != 0 || !record.timed_out {
            return Err(format!("Expected a timed-out transport failure, got {:?}", record));
        }
        if record.latency > Duration::from_secs(2) {
            return Err(format!("Deadline was not honoured: {:?}", record.latency));
        }
        Ok(())
    })
}

#[test]
fn run_test_rejects_invalid_config_before_dispatch() -> Result<(), String> {
    run_async_test(async {
        let cases = [
            TestConfig::new("http://127.0.0.1:9/", 0.0, Duration::from_secs(1), 1),
            TestConfig::new("http://127.0.0.1:9/", 1.0, Duration::ZERO, 1),
            TestConfig::new("http://127.0.0.1:9/", 1.0, Duration::from_secs(1), 0),
            TestConfig::new("not a url", 1.0, Duration::from_secs(1), 1),
        ];
        for config in &cases {
            match run_test(config).await {
                Err(AppError::Validation(_)) => {}
                Err(err) => return Err(format!("Unexpected error kind: {}", err)),
                Ok(_) => return Err(format!("Expected rejection for {:?}", config)),
            }
        }
        Ok(())
    })
}

#[test]
fn run_test_absorbs_transport_failures_and_groups_bursts() -> Result<(), String> {
    run_async_test(async {
        let config = TestConfig::new(closed_port_url()?, 10.0, Duration::from_secs(1), 5);
        let result = run_test(&config).await.map_err(|err| err.to_string())?;

        if result.len() != 10 || result.dispatched != 10 {
            return Err(format!(
                "Expected 10 records, got {} of {} dispatched",
                result.len(),
                result.dispatched
            ));
        }
        if result.records.iter().any(|record| record.status_code != 0) {
            return Err("Expected only transport failures".to_owned());
        }
        let early = result
            .records
            .iter()
            .filter(|record| record.relative_time < Duration::from_millis(250))
            .count();
        let late = result
            .records
            .iter()
            .filter(|record| record.relative_time >= Duration::from_millis(450))
            .count();
        if early != 5 || late != 5 {
            return Err(format!("Expected two bursts of 5, got {} and {}", early, late));
        }
        if result.cancelled || result.abandoned != 0 {
            return Err("Expected a clean finish".to_owned());
        }
        Ok(())
    })
}

#[test]
fn run_test_with_publishes_phases() -> Result<(), String> {
    run_async_test(async {
        let config = TestConfig::new(closed_port_url()?, 20.0, Duration::from_millis(100), 1);
        let (progress_tx, progress_rx) = tokio::sync::watch::channel(RunSnapshot::default());
        let hooks = RunHooks {
            progress: Some(progress_tx),
            shutdown: None,
        };

        let result = run_test_with(&config, hooks)
            .await
            .map_err(|err| err.to_string())?;
        let snapshot = progress_rx.borrow().clone();
        if snapshot.phase != RunPhase::Done {
            return Err(format!("Expected Done, got {:?}", snapshot.phase));
        }
        if snapshot.dispatched != result.dispatched {
            return Err(format!(
                "Snapshot dispatched {} differs from result {}",
                snapshot.dispatched, result.dispatched
            ));
        }
        if snapshot.completed != u64::try_from(result.len()).unwrap_or(u64::MAX) {
            return Err("Snapshot completion count differs from result".to_owned());
        }
        Ok(())
    })
}

#[test]
fn run_test_with_stops_on_shutdown() -> Result<(), String> {
    run_async_test(async {
        let config = TestConfig::new(closed_port_url()?, 10.0, Duration::from_secs(30), 1);
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let hooks = RunHooks {
            progress: None,
            shutdown: Some(shutdown_rx),
        };

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            drop(shutdown_tx.send(()));
        });
        let started = std::time::Instant::now();
        let result = run_test_with(&config, hooks)
            .await
            .map_err(|err| err.to_string())?;
        stopper.await.map_err(|err| err.to_string())?;

        if !result.cancelled {
            return Err("Expected the run to be marked cancelled".to_owned());
        }
        if started.elapsed() > Duration::from_secs(5) {
            return Err("Shutdown did not stop the run promptly".to_owned());
        }
        if result.is_empty() || result.len() > 5 {
            return Err(format!("Expected a partial result, got {}", result.len()));
        }
        Ok(())
    })
}
