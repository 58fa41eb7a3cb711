//! Scheduling and dispatch of the requests that make up one run.
mod client;
mod dispatch;
mod runner;
mod schedule;

#[cfg(test)]
mod tests;

pub use client::{RequestTemplate, build_client};
pub use dispatch::dispatch;
pub use runner::{RunHooks, run_test, run_test_with};
pub use schedule::BurstSchedule;
