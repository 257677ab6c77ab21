//! Logging setup for evald
//!
//! All output goes to stderr so the CLI's stdout only carries evaluation
//! results. Worker processes get their own initializer because their stderr
//! is captured and attributed to user code.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_worker_tracing};
