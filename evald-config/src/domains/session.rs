//! Session scheduling configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Session scheduling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of tasks waiting behind the one in flight.
    /// `None` leaves the queue unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue_len: Option<usize>,

    /// How long a task may stay in flight before a stall warning is logged
    #[serde(with = "humantime_serde", default = "default_stall_warning")]
    pub stall_warning: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_queue_len: None,
            stall_warning: default_stall_warning(),
        }
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_queue_len == Some(0) {
            return Err(self.invalid("max_queue_len must be at least 1; omit it for an unbounded queue"));
        }

        self.require_nonzero("stall_warning", self.stall_warning)
    }

    fn section(&self) -> &'static str {
        "session"
    }
}

fn default_stall_warning() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_queue_len, None);
        assert_eq!(config.stall_warning, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_validation() {
        let mut config = SessionConfig {
            max_queue_len: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_queue_len = Some(16);
        assert!(config.validate().is_ok());

        config.stall_warning = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sub_second_stall_warning_round_trips() {
        let config: SessionConfig = serde_yaml::from_str("stall_warning: 500ms\n").unwrap();
        assert_eq!(config.stall_warning, Duration::from_millis(500));

        let shown = serde_yaml::to_string(&config).unwrap();
        let reparsed: SessionConfig = serde_yaml::from_str(&shown).unwrap();
        assert_eq!(reparsed.stall_warning, Duration::from_millis(500));
        assert!(reparsed.validate().is_ok());
    }
}
