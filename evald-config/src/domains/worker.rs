//! Worker process configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Environment variable carrying the worker's tracing filter
pub const WORKER_LOG_ENV: &str = "EVALD_WORKER_LOG";

/// How session workers are launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable. `None` re-executes the current binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,

    /// Arguments placed before `--worker-id <id>`
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// How long to wait for a spawned worker to connect back
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Grace period between the shutdown message and a forced kill
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,

    /// Extra environment variables for the worker
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Tracing filter for the worker itself; its logs go to the captured stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: default_args(),
            connect_timeout: default_connect_timeout(),
            shutdown_grace: default_shutdown_grace(),
            env: BTreeMap::new(),
            log_level: None,
        }
    }
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self
            .program
            .as_ref()
            .is_some_and(|program| program.as_os_str().is_empty())
        {
            return Err(self.invalid("program must not be empty when set"));
        }

        self.require_nonzero("connect_timeout", self.connect_timeout)?;
        self.require_nonzero("shutdown_grace", self.shutdown_grace)?;

        if let Some(key) = self
            .env
            .keys()
            .find(|key| key.is_empty() || key.contains('='))
        {
            return Err(self.invalid(format!("invalid env variable name {:?}", key)));
        }

        Ok(())
    }

    fn section(&self) -> &'static str {
        "worker"
    }
}

fn default_args() -> Vec<String> {
    vec!["--worker".to_string()]
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_millis(500)
}
