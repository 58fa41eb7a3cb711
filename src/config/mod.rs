//! Configuration loading and application.
mod apply;
mod loader;
mod runtime;
pub mod types;


pub use apply::apply_config;
pub use loader::{default_config_path, load_config};
pub use runtime::build_test_config;

#[cfg(any(test, feature = "fuzzing"))]
pub(crate) use loader::load_config_file;
