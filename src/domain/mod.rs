//! Run configuration shared by the CLI and library callers.
mod config;


pub use config::TestConfig;
