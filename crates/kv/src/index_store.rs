//! Index-keyed record store.
//!
//! [`KeyIndexStore`] is the only component that knows how records and the
//! index are laid out on the ledger. It is a stateless proxy: every method is
//! one (or, for [`KeyIndexStore::append_to_index`], two) ledger calls, bounded
//! by [`StoreConfig::call_timeout`], with no caching and no retry.
//!
//! # The index race
//!
//! The ledger has no append or compare-and-swap primitive, so adding an id
//! to the index is a read-modify-write of the whole value. Two submitters
//! interleaving that sequence lose one of the index entries (last writer
//! wins). The orphaned record stays on the ledger but is unreachable until
//! its id is indexed again. This is a permanent property of the single
//! index key; [`KeyIndexStore::append_to_index`] is the one place to change
//! when a ledger with conditional writes is available.

use std::{future::Future, sync::Arc, time::Duration};

use heliowatch_types::{
    RecordId, RecordIndex,
    config::{LedgerKeysConfig, StoreConfig},
};
use snafu::ResultExt;

use crate::{
    error::{EncodeIndexSnafu, LedgerError, LedgerSnafu, MalformedIndexSnafu, Result, StoreError},
    ledger::{KeyValueLedger, WriteReceipt},
};

/// Reads and writes the index and record entries of the ledger.
#[derive(Clone)]
pub struct KeyIndexStore {
    ledger: Arc<dyn KeyValueLedger>,
    keys: LedgerKeysConfig,
    config: StoreConfig,
}

impl std::fmt::Debug for KeyIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIndexStore")
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeyIndexStore {
    /// Creates a store over `ledger` with the default key layout and call bounds.
    pub fn new(ledger: Arc<dyn KeyValueLedger>) -> Self {
        Self::with_config(ledger, LedgerKeysConfig::default(), StoreConfig::default())
    }

    /// Creates a store with explicit key layout and call bounds.
    pub fn with_config(
        ledger: Arc<dyn KeyValueLedger>,
        keys: LedgerKeysConfig,
        config: StoreConfig,
    ) -> Self {
        Self { ledger, keys, config }
    }

    /// Returns the key layout in use.
    pub fn keys(&self) -> &LedgerKeysConfig {
        &self.keys
    }

    /// Returns the ledger key of record `id`.
    pub fn record_key(&self, id: &RecordId) -> String {
        self.keys.record_key(id)
    }

    /// Asks the ledger whether it is serving.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the probe itself fails or times out.
    pub async fn is_available(&self) -> Result<bool> {
        let key = &self.keys.index_key;
        self.bounded(key, self.ledger.is_available()).await
    }

    /// Reads the index.
    ///
    /// A missing or empty index value is an empty index, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MalformedIndex`] if the value is not a JSON array
    /// of ids, or a transport/timeout [`StoreError`] if the read fails.
    pub async fn read_index(&self) -> Result<RecordIndex> {
        let key = &self.keys.index_key;
        let bytes = self.bounded(key, self.ledger.get_data(key)).await?;
        RecordIndex::from_bytes(&bytes).context(MalformedIndexSnafu { key: key.clone() })
    }

    /// Reads the raw bytes of record `id`.
    ///
    /// Returns `Ok(None)` when nothing is stored under the record key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails or times out.
    pub async fn read_record(&self, id: &RecordId) -> Result<Option<Vec<u8>>> {
        let key = self.record_key(id);
        let bytes = self.bounded(&key, self.ledger.get_data(&key)).await?;
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }

    /// Writes the bytes of record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or times out. A timed-out
    /// write may still have been applied.
    pub async fn write_record(&self, id: &RecordId, bytes: Vec<u8>) -> Result<WriteReceipt> {
        let key = self.record_key(id);
        self.bounded(&key, self.ledger.set_data(&key, bytes)).await
    }

    /// Overwrites the whole index value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if encoding, the write, or its timeout fails.
    pub async fn write_index(&self, index: &RecordIndex) -> Result<WriteReceipt> {
        let key = &self.keys.index_key;
        let bytes = index.to_bytes().context(EncodeIndexSnafu)?;
        self.bounded(key, self.ledger.set_data(key, bytes)).await
    }

    /// Adds `id` to the index with a fresh read followed by a full overwrite.
    ///
    /// Returns the index as written. If `id` is already indexed, nothing is
    /// written and the index is returned as read.
    ///
    /// This is where the lost-update race described in the module docs lives:
    /// a concurrent overwrite landing between the read and the write is lost.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of the failing read or write.
    pub async fn append_to_index(&self, id: &RecordId) -> Result<RecordIndex> {
        let mut index = self.read_index().await?;
        if !index.append(id.clone()) {
            tracing::debug!(id = %id, "id already indexed, skipping index write");
            return Ok(index);
        }
        self.write_index(&index).await?;
        tracing::debug!(id = %id, index_len = index.len(), "index updated");
        Ok(index)
    }

    async fn bounded<T>(
        &self,
        key: &str,
        call: impl Future<Output = std::result::Result<T, LedgerError>>,
    ) -> Result<T> {
        let limit = self.config.call_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.context(LedgerSnafu { key }),
            Err(_) => Err(StoreError::Timeout { key: key.to_owned(), duration_ms: millis(limit) }),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
