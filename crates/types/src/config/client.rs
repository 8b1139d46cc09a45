//! Synchronisation and submission configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::id::DEFAULT_ID_PREFIX;

/// Upper bound on concurrent record reads during one synchronisation.
const MAX_FAN_OUT: usize = 256;

fn default_fan_out() -> usize {
    8
}

/// Synchronisation settings.
///
/// # Validation Rules
///
/// - `fan_out` must be in `1..=256`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncConfig {
    /// Maximum number of record reads in flight at once.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
}

#[bon::bon]
impl SyncConfig {
    /// Creates a synchronisation configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `fan_out` is outside `1..=256`.
    #[builder]
    pub fn new(#[builder(default = default_fan_out())] fan_out: usize) -> Result<Self, ConfigError> {
        let config = Self { fan_out };
        config.validate()?;
        Ok(config)
    }
}

impl SyncConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fan_out == 0 || self.fan_out > MAX_FAN_OUT {
            return Err(ConfigError::Validation {
                message: format!("fan_out must be in 1..={MAX_FAN_OUT}, got {}", self.fan_out),
            });
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { fan_out: default_fan_out() }
    }
}

fn default_id_prefix() -> String {
    DEFAULT_ID_PREFIX.to_string()
}

fn default_success_display() -> Duration {
    Duration::from_secs(2)
}

fn default_error_display() -> Duration {
    Duration::from_secs(3)
}

/// Submission settings.
///
/// # Validation Rules
///
/// - `id_prefix` must be non-empty and contain only ASCII alphanumerics
///
/// A zero display duration disables the automatic return to idle for that
/// outcome.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use heliowatch_types::config::SubmissionConfig;
/// let config = SubmissionConfig::builder()
///     .id_prefix("drill")
///     .success_display(Duration::from_secs(1))
///     .build()
///     .expect("valid submission config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubmissionConfig {
    /// Prefix of generated record ids.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    /// How long a success state is shown before returning to idle.
    #[serde(default = "default_success_display")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub success_display: Duration,
    /// How long an error state is shown before returning to idle.
    #[serde(default = "default_error_display")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub error_display: Duration,
}

#[bon::bon]
impl SubmissionConfig {
    /// Creates a submission configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `id_prefix` is empty or not alphanumeric.
    #[builder]
    pub fn new(
        #[builder(into, default = default_id_prefix())] id_prefix: String,
        #[builder(default = default_success_display())] success_display: Duration,
        #[builder(default = default_error_display())] error_display: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { id_prefix, success_display, error_display };
        config.validate()?;
        Ok(config)
    }
}

impl SubmissionConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_prefix.is_empty() || !self.id_prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "id_prefix must be non-empty ASCII alphanumeric, got {:?}",
                    self.id_prefix
                ),
            });
        }
        Ok(())
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            success_display: default_success_display(),
            error_display: default_error_display(),
        }
    }
}
