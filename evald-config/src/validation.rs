//! Section validation

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// A configuration section that can check its own values after loading
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name used in error messages
    fn section(&self) -> &'static str;

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            section: self.section(),
            message: message.into(),
        }
    }

    fn require_nonzero(&self, field: &str, value: Duration) -> ConfigResult<()> {
        if value.is_zero() {
            return Err(self.invalid(format!("{} must be greater than zero", field)));
        }
        Ok(())
    }
}
