//! The key-value ledger interface.
//!
//! The ledger offers exactly three calls: read a key, overwrite a key, and ask
//! whether the service is serving. It has no enumeration, no append and no
//! compare-and-swap. Everything list-shaped is built on top by
//! [`KeyIndexStore`](crate::KeyIndexStore).
//!
//! Implementations decide their own transport, signing and timeout
//! behaviour. A write, once issued, may land even if the caller stops
//! waiting for it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LedgerError;

/// Acknowledgement of a completed `setData` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Implementation-defined transaction reference.
    pub transaction: String,
}

impl WriteReceipt {
    /// Creates a receipt for the given transaction reference.
    pub fn new(transaction: impl Into<String>) -> Self {
        Self { transaction: transaction.into() }
    }
}

/// Minimal remote key-value ledger.
#[async_trait]
pub trait KeyValueLedger: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// A key that was never written reads as an empty value.
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError>;

    /// Overwrites the value stored under `key`.
    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt, LedgerError>;

    /// Reports whether the ledger is currently serving requests.
    async fn is_available(&self) -> Result<bool, LedgerError>;
}

#[async_trait]
impl<T: KeyValueLedger + ?Sized> KeyValueLedger for Arc<T> {
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        (**self).get_data(key).await
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt, LedgerError> {
        (**self).set_data(key, value).await
    }

    async fn is_available(&self) -> Result<bool, LedgerError> {
        (**self).is_available().await
    }
}
