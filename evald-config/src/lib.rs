//! Domain-driven configuration management for evald
//!
//! Configuration is split by functional domain (sessions, workers, logging),
//! loaded from YAML, overridden from `EVALD_*` environment variables and
//! validated before use.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    logging::{LogFormat, LogLevel, LoggingConfig},
    session::SessionConfig,
    worker::{WorkerConfig, WORKER_LOG_ENV},
    EvaldConfig,
};
