//! Ledger key layout and store call configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::record::RecordId;

/// Default key holding the record index.
pub const DEFAULT_INDEX_KEY: &str = "spaceweather_keys";

/// Default prefix prepended to a record id to form its key.
pub const DEFAULT_RECORD_PREFIX: &str = "spaceweather_";

fn default_index_key() -> String {
    DEFAULT_INDEX_KEY.to_string()
}

fn default_record_prefix() -> String {
    DEFAULT_RECORD_PREFIX.to_string()
}

/// Key names used on the ledger.
///
/// # Validation Rules
///
/// - `index_key` must be non-empty
/// - `record_prefix` must be non-empty
///
/// # Example
///
/// ```no_run
/// # use heliowatch_types::config::LedgerKeysConfig;
/// let keys = LedgerKeysConfig::builder()
///     .index_key("staging_keys")
///     .record_prefix("staging_")
///     .build()
///     .expect("valid key layout");
/// assert_eq!(keys.record_key(&"sw-1".into()), "staging_sw-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerKeysConfig {
    /// Well-known key whose value is the JSON array of record ids.
    #[serde(default = "default_index_key")]
    pub index_key: String,
    /// Prefix of every record key (`<record_prefix><id>`).
    #[serde(default = "default_record_prefix")]
    pub record_prefix: String,
}

#[bon::bon]
impl LedgerKeysConfig {
    /// Creates a key layout with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if either key component is empty.
    #[builder]
    pub fn new(
        #[builder(into, default = default_index_key())] index_key: String,
        #[builder(into, default = default_record_prefix())] record_prefix: String,
    ) -> Result<Self, ConfigError> {
        let config = Self { index_key, record_prefix };
        config.validate()?;
        Ok(config)
    }
}

impl LedgerKeysConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_key.is_empty() {
            return Err(ConfigError::Validation {
                message: "index_key must not be empty".to_string(),
            });
        }
        if self.record_prefix.is_empty() {
            return Err(ConfigError::Validation {
                message: "record_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the ledger key holding record `id`.
    pub fn record_key(&self, id: &RecordId) -> String {
        format!("{}{}", self.record_prefix, id)
    }
}

impl Default for LedgerKeysConfig {
    fn default() -> Self {
        Self { index_key: default_index_key(), record_prefix: default_record_prefix() }
    }
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Bounds applied to every individual ledger call.
///
/// # Validation Rules
///
/// - `call_timeout` must be > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Maximum time a single `getData`/`setData`/`isAvailable` call may take.
    ///
    /// A call exceeding it fails with a timeout store error. The write it
    /// carried may still land on the ledger.
    #[serde(default = "default_call_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub call_timeout: Duration,
}

#[bon::bon]
impl StoreConfig {
    /// Creates a store configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `call_timeout` is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_call_timeout())] call_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { call_timeout };
        config.validate()?;
        Ok(config)
    }
}

impl StoreConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "call_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { call_timeout: default_call_timeout() }
    }
}
