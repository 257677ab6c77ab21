//! Configuration loading and environment variable handling

use crate::domains::logging::{LogFormat, LogLevel};
use crate::domains::EvaldConfig;
use crate::error::{ConfigError, ConfigResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `EVALD` prefix
    pub fn new() -> Self {
        Self {
            prefix: "EVALD".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<EvaldConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: EvaldConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<EvaldConfig> {
        let mut config = EvaldConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from `config_path` when given, otherwise from the environment
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<EvaldConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut EvaldConfig) -> ConfigResult<()> {
        let session = &mut config.session;
        if let Some(len) = self.parse_var::<usize>("MAX_QUEUE_LEN")? {
            session.max_queue_len = Some(len);
        }
        if let Some(seconds) = self.parse_var::<u64>("STALL_WARNING_SECONDS")? {
            session.stall_warning = Duration::from_secs(seconds);
        }

        let worker = &mut config.worker;
        if let Some(program) = self.var("WORKER_PROGRAM") {
            worker.program = Some(PathBuf::from(program));
        }
        if let Some(seconds) = self.parse_var::<u64>("WORKER_CONNECT_TIMEOUT")? {
            worker.connect_timeout = Duration::from_secs(seconds);
        }
        if let Some(directive) = self.var("WORKER_LOG") {
            worker.log_level = Some(directive);
        }

        let logging = &mut config.logging;
        if let Some(level) = self.parse_var::<LogLevel>("LOG_LEVEL")? {
            logging.level = level;
        }
        if let Some(format) = self.parse_var::<LogFormat>("LOG_FORMAT")? {
            logging.format = format;
        }

        Ok(())
    }

    /// Prefixed environment variable, if set
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name)).ok()
    }

    fn parse_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(value) = self.var(name) else {
            return Ok(None);
        };
        let parsed = value.trim().parse::<T>();
        parsed.map(Some).map_err(|e| ConfigError::Env {
            var: format!("{}_{}", self.prefix, name),
            message: e.to_string(),
            value,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
