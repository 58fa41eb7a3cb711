use std::future::pending;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::{
    domain::TestConfig,
    error::AppResult,
    metrics::{
        ProgressPublisher, RecordSink, RequestRecord, RunPhase, RunSnapshot, TestRunResult,
        setup_record_collector,
    },
    shutdown::ShutdownReceiver,
};

use super::client::{RequestTemplate, build_client};
use super::dispatch::dispatch;
use super::schedule::BurstSchedule;

/// Slack past the last request deadline for settled dispatches to reach the
/// collector before stragglers are aborted.
const DRAIN_GRACE: Duration = Duration::from_millis(250);
/// Stand-in horizon for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(946_080_000);

/// Optional wiring between a run and its caller.
#[derive(Debug, Default)]
pub struct RunHooks {
    /// Receives a [`RunSnapshot`] as the run progresses.
    pub progress: Option<watch::Sender<RunSnapshot>>,
    /// A message (or a lagged receiver) stops the run early. A closed
    /// channel is ignored.
    pub shutdown: Option<ShutdownReceiver>,
}

/// Runs one test with no external hooks.
///
/// # Errors
///
/// Returns an error only when the config is invalid or the HTTP client
/// cannot be built; nothing has been sent in either case. Failed requests
/// are part of the result.
pub async fn run_test(config: &TestConfig) -> AppResult<TestRunResult> {
    run_test_with(config, RunHooks::default()).await
}

/// Runs one test, publishing progress and honouring shutdown through `hooks`.
///
/// A cancelled run still returns every record collected before the
/// shutdown, with `cancelled` set.
///
/// # Errors
///
/// Returns an error only when the config is invalid or the HTTP client
/// cannot be built; nothing has been sent in either case. Failed requests
/// are part of the result.
pub async fn run_test_with(config: &TestConfig, hooks: RunHooks) -> AppResult<TestRunResult> {
    config.validate()?;
    let client = build_client(config)?;
    let template = RequestTemplate::new(&client, config)?;
    let schedule = BurstSchedule::from_config(config);

    let progress = hooks
        .progress
        .map_or_else(ProgressPublisher::detached, ProgressPublisher::new);
    let mut shutdown = hooks.shutdown;

    info!(
        "Starting run: {} {} at {} rps for {:?}, bursts of {} every {:?}",
        config.method,
        config.url,
        config.rps,
        config.duration,
        config.burst_size,
        schedule.interval()
    );

    let started_at = Utc::now();
    let run_start = Instant::now();
    progress.advance(RunPhase::Running);
    let (sink, collector) = setup_record_collector(progress.clone(), run_start);

    let mut run = RunState {
        client,
        template,
        sink,
        in_flight: JoinSet::new(),
        request_timeout: config.timeout,
        last_release: None,
        dispatched: 0,
        abandoned: 0,
        cancelled: false,
    };

    run.schedule(&schedule, run_start, &progress, &mut shutdown)
        .await;
    if !run.cancelled {
        progress.advance(RunPhase::Draining);
        run.drain(config.drain_allowance(), &mut shutdown).await;
    }
    run.abandon_in_flight().await;

    let RunState {
        sink,
        dispatched,
        abandoned,
        cancelled,
        ..
    } = run;
    drop(sink);
    let records = collector.finalize().await?;
    let elapsed = run_start.elapsed();
    progress.update(|snapshot| snapshot.elapsed = elapsed);
    progress.advance(RunPhase::Done);

    info!(
        "Run finished: {} dispatched, {} recorded, {} abandoned in {:?}{}",
        dispatched,
        records.len(),
        abandoned,
        elapsed,
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(TestRunResult {
        config: config.clone(),
        records,
        started_at,
        elapsed,
        dispatched,
        abandoned,
        cancelled,
    })
}

struct RunState {
    client: Client,
    template: RequestTemplate,
    sink: RecordSink,
    in_flight: JoinSet<()>,
    request_timeout: Duration,
    /// When the most recent burst was released.
    last_release: Option<Instant>,
    dispatched: u64,
    abandoned: u64,
    cancelled: bool,
}

impl RunState {
    /// Releases bursts on the absolute timeline until the duration is over,
    /// the request budget is spent, or shutdown arrives. Never waits for a
    /// dispatch to finish.
    async fn schedule(
        &mut self,
        schedule: &BurstSchedule,
        run_start: Instant,
        progress: &ProgressPublisher,
        shutdown: &mut Option<ShutdownReceiver>,
    ) {
        let mut burst_index: u64 = 0;
        loop {
            let burst = schedule.burst_len(self.dispatched);
            if burst == 0 {
                debug!("Request budget spent after {} dispatches", self.dispatched);
                break;
            }
            let released_at = Instant::now();
            self.release_burst(
                burst,
                released_at,
                released_at.saturating_duration_since(run_start),
            );
            progress.add_dispatched(u64::try_from(burst).unwrap_or(u64::MAX));
            self.reap_finished();

            burst_index = burst_index.saturating_add(1);
            let Some(deadline) = schedule.deadline(run_start, burst_index) else {
                break;
            };

            tokio::select! {
                () = sleep_until(deadline) => {}
                () = wait_for_shutdown(shutdown) => {
                    info!("Shutdown requested; stopping the schedule");
                    self.cancelled = true;
                    break;
                }
            }

            if !schedule.is_open(run_start.elapsed()) {
                break;
            }
        }
    }

    fn release_burst(&mut self, burst: usize, released_at: Instant, relative_time: Duration) {
        self.last_release = Some(released_at);
        let deadline = settle_deadline(released_at, self.request_timeout);
        for _ in 0..burst {
            self.dispatched = self.dispatched.saturating_add(1);
            let request = match self.template.instantiate() {
                Ok(request) => request,
                Err(err) => {
                    warn!("Failed to prepare request: {}", err);
                    let record = RequestRecord::transport_failure(
                        Duration::ZERO,
                        relative_time,
                        err.to_string(),
                        false,
                    );
                    if let Err(send_err) = self.sink.add(record) {
                        debug!("Dropping record: {}", send_err);
                    }
                    continue;
                }
            };
            let client = self.client.clone();
            let sink = self.sink.clone();
            self.in_flight.spawn(async move {
                let record = dispatch(&client, request, relative_time, deadline).await;
                if let Err(err) = sink.add(record) {
                    debug!("Dropping record: {}", err);
                }
            });
        }
    }

    /// Clears already-finished dispatch handles so the set stays small on
    /// long runs.
    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(err) = joined {
                warn!("Dispatch task failed: {}", err);
            }
        }
    }

    /// Waits for outstanding dispatches, at most `allowance` past the last
    /// release (plus a short grace). With the default allowance every
    /// dispatch reaches its own deadline first.
    async fn drain(&mut self, allowance: Duration, shutdown: &mut Option<ShutdownReceiver>) {
        if self.in_flight.is_empty() {
            return;
        }
        debug!(
            "Draining {} in-flight requests for up to {:?}",
            self.in_flight.len(),
            allowance
        );
        let last_release = self.last_release.unwrap_or_else(Instant::now);
        let drain_deadline = last_release
            .checked_add(allowance)
            .and_then(|deadline| deadline.checked_add(DRAIN_GRACE));

        loop {
            tokio::select! {
                joined = self.in_flight.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok(())) => {}
                        Some(Err(err)) => warn!("Dispatch task failed: {}", err),
                    }
                }
                () = sleep_until_opt(drain_deadline) => {
                    warn!(
                        "Drain allowance of {:?} exceeded with {} requests in flight",
                        allowance,
                        self.in_flight.len()
                    );
                    break;
                }
                () = wait_for_shutdown(shutdown) => {
                    info!("Shutdown requested while draining");
                    self.cancelled = true;
                    break;
                }
            }
        }
    }

    /// Aborts whatever is still in flight and waits for the tasks to go away,
    /// so their sink handles are released.
    async fn abandon_in_flight(&mut self) {
        let outstanding = u64::try_from(self.in_flight.len()).unwrap_or(u64::MAX);
        if outstanding == 0 {
            return;
        }
        self.in_flight.abort_all();
        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {
                    self.abandoned = self.abandoned.saturating_add(1);
                }
                Err(err) => warn!("Dispatch task failed: {}", err),
            }
        }
        if self.abandoned > 0 {
            warn!("Abandoned {} in-flight requests", self.abandoned);
        }
    }
}

fn settle_deadline(released_at: Instant, timeout: Duration) -> Instant {
    released_at
        .checked_add(timeout)
        .or_else(|| released_at.checked_add(FAR_FUTURE))
        .unwrap_or(released_at)
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<ShutdownReceiver>) {
    let Some(receiver) = shutdown.as_mut() else {
        return pending::<()>().await;
    };
    match receiver.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => {
            *shutdown = None;
            pending::<()>().await;
        }
    }
}
