use std::time::Duration;

use ratelimit_tester::metrics::{RunPhase, RunSnapshot};
use tokio::sync::watch;
use tracing::{debug, info};

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Logs the live snapshot about once per second until the run reports
/// `Done` or the publisher goes away.
pub(crate) fn setup_progress_logger(
    mut progress_rx: watch::Receiver<RunSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROGRESS_LOG_INTERVAL);
        ticker.tick().await;
        let mut last_phase = RunPhase::Idle;

        loop {
            tokio::select! {
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = progress_rx.borrow_and_update().clone();
                    if snapshot.phase != last_phase {
                        debug!("Run phase: {}", snapshot.phase.as_str());
                        last_phase = snapshot.phase;
                    }
                    if snapshot.phase == RunPhase::Done {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let snapshot = progress_rx.borrow().clone();
                    if matches!(snapshot.phase, RunPhase::Running | RunPhase::Draining) {
                        info!("{}", progress_line(&snapshot));
                    }
                }
            }
        }
    })
}

fn progress_line(snapshot: &RunSnapshot) -> String {
    let mut line = format!(
        "[{}] t={:.1}s dispatched={} completed={} in_flight={} 429s={} failures={} p50={}ms p90={}ms p99={}ms",
        snapshot.phase.as_str(),
        snapshot.elapsed.as_secs_f64(),
        snapshot.dispatched,
        snapshot.completed,
        snapshot.in_flight(),
        snapshot.throttled,
        snapshot.transport_failures,
        snapshot.p50.as_millis(),
        snapshot.p90.as_millis(),
        snapshot.p99.as_millis()
    );
    if !snapshot.detected_headers.is_empty() {
        let headers: Vec<String> = snapshot
            .detected_headers
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        line.push_str(" headers: ");
        line.push_str(&headers.join(" "));
    }
    line
}
