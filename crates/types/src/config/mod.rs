//! Configuration types for heliowatch.
//!
//! Configuration is loaded from TOML files and environment variables.
//! All config structs validate their values at construction time via
//! fallible builders. Post-deserialization validation is available via
//! the `validate()` method on each struct.

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions.
#![allow(clippy::unwrap_used)]

mod client;
mod ledger;

pub use client::*;
pub use ledger::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range or
/// violates a cross-field constraint.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Complete client configuration.
///
/// Every section is optional in serialized form and falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HeliowatchConfig {
    /// Ledger key layout.
    #[serde(default)]
    pub keys: LedgerKeysConfig,
    /// Per-call store bounds.
    #[serde(default)]
    pub store: StoreConfig,
    /// Synchronisation settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Submission settings.
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl HeliowatchConfig {
    /// Validates every section and the constraints between them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a section is invalid, or if the
    /// index key could collide with the key of a generated record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keys.validate()?;
        self.store.validate()?;
        self.sync.validate()?;
        self.submission.validate()?;

        let generated_key_prefix =
            format!("{}{}-", self.keys.record_prefix, self.submission.id_prefix);
        if self.keys.index_key.starts_with(&generated_key_prefix) {
            return Err(ConfigError::Validation {
                message: format!(
                    "index_key {:?} overlaps generated record keys ({generated_key_prefix}...)",
                    self.keys.index_key
                ),
            });
        }
        Ok(())
    }
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
