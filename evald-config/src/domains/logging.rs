//! Logging configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Host-side logging. Worker processes are configured separately through
/// `worker.log_level` because their stderr is captured as user output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for every target
    pub level: LogLevel,

    pub format: LogFormat,

    /// Include file and line in each event
    pub include_location: bool,

    /// Extra per-target filters such as `evald_session=debug`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// `EnvFilter` directive string: the default level followed by the
    /// per-target overrides
    pub fn filter_directive(&self) -> String {
        std::iter::once(self.level.as_str().to_string())
            .chain(self.directives.iter().map(|d| d.trim().to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

const LEVEL_NAMES: &[(&str, LogLevel)] = &[
    ("error", LogLevel::Error),
    ("warn", LogLevel::Warn),
    ("warning", LogLevel::Warn),
    ("info", LogLevel::Info),
    ("debug", LogLevel::Debug),
    ("trace", LogLevel::Trace),
];

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(LEVEL_NAMES, s).ok_or_else(|| format!("unknown log level {:?}", s))
    }
}

/// Output format of host log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
    Compact,
    Pretty,
}

const FORMAT_NAMES: &[(&str, LogFormat)] = &[
    ("json", LogFormat::Json),
    ("text", LogFormat::Text),
    ("compact", LogFormat::Compact),
    ("pretty", LogFormat::Pretty),
];

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = FORMAT_NAMES
            .iter()
            .find(|(_, format)| format == self)
            .map_or("text", |(name, _)| name);
        f.write_str(name)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(FORMAT_NAMES, s).ok_or_else(|| format!("unknown log format {:?}", s))
    }
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name.trim()))
        .map(|(_, value)| *value)
}

impl Validatable for LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        for directive in &self.directives {
            let (target, level) = directive.split_once('=').unwrap_or(("", ""));
            if target.trim().is_empty() || level.trim().parse::<LogLevel>().is_err() {
                return Err(self.invalid(format!(
                    "directive {:?} must look like target=level",
                    directive
                )));
            }
        }
        Ok(())
    }

    fn section(&self) -> &'static str {
        "logging"
    }
}
