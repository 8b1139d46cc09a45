//! In-process ledger for tests and local development.
//!
//! [`MemoryLedger`] is a controllable implementation of [`KeyValueLedger`]
//! backed by a hash map.
//!
//! # Features
//!
//! - **Seeding**: Put raw bytes under any key, including malformed records
//! - **Failure injection**: Fail the next N reads or writes, fail or reject writes to specific
//!   keys, take the service offline
//! - **Interleaving**: Queue a write that lands right after the next read of a key, to reproduce a
//!   concurrent submitter
//! - **Delays**: Global or per-key latency
//! - **Request counting**: Total and per-key call counts for verification
//!
//! # Example
//!
//! ```no_run
//! use heliowatch_kv::{KeyValueLedger, MemoryLedger};
//!
//! # async fn example() {
//! let ledger = MemoryLedger::new();
//! ledger.put_raw("spaceweather_keys", br#"["sw-1"]"#);
//! ledger.fail_next_gets(1);
//!
//! assert!(ledger.get_data("spaceweather_keys").await.is_err());
//! assert_eq!(ledger.get_data("spaceweather_keys").await.unwrap(), br#"["sw-1"]"#);
//! assert_eq!(ledger.get_count(), 2);
//! # }
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{LedgerError, RejectedSnafu, TransportSnafu, UnavailableSnafu},
    ledger::{KeyValueLedger, WriteReceipt},
};

/// Shared state for the memory ledger.
#[derive(Debug, Default)]
struct MemoryState {
    /// Stored values.
    entries: RwLock<HashMap<String, Vec<u8>>>,

    /// Whether `is_available` reports the service as serving.
    offline: AtomicBool,

    /// Number of transport failures to inject for the next reads.
    failing_gets: AtomicUsize,

    /// Number of transport failures to inject for the next writes.
    failing_sets: AtomicUsize,

    /// Keys whose reads always fail.
    failing_get_keys: RwLock<HashSet<String>>,

    /// Keys whose writes always fail with a transport error.
    failing_set_keys: RwLock<HashSet<String>>,

    /// Keys whose writes are always rejected by the signer.
    rejected_set_keys: RwLock<HashSet<String>>,

    /// Writes applied right after the next read of their key.
    writes_after_get: RwLock<HashMap<String, Vec<u8>>>,

    /// Delay injected into every call (milliseconds).
    delay_ms: AtomicU64,

    /// Extra per-key read delay (milliseconds).
    key_delays_ms: RwLock<HashMap<String, u64>>,

    /// Total `get_data` calls.
    get_count: AtomicUsize,

    /// Total `set_data` calls.
    set_count: AtomicUsize,

    /// Total `is_available` calls.
    availability_checks: AtomicUsize,

    /// `set_data` calls per key.
    set_counts: RwLock<HashMap<String, usize>>,

    /// Transaction counter for receipts.
    transactions: AtomicU64,
}

/// Controllable in-memory [`KeyValueLedger`].
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<MemoryState>,
}

impl MemoryLedger {
    /// Creates an empty, available ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes under `key` without counting a write.
    pub fn put_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state.entries.write().insert(key.into(), value.into());
    }

    /// Returns the raw bytes stored under `key`, without counting a read.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state.entries.read().get(key).cloned()
    }

    /// Returns every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Takes the service offline (`is_available` returns false and calls fail) or back online.
    pub fn set_available(&self, available: bool) {
        self.state.offline.store(!available, Ordering::SeqCst);
    }

    /// Injects transport errors for the next `count` reads.
    pub fn fail_next_gets(&self, count: usize) {
        self.state.failing_gets.store(count, Ordering::SeqCst);
    }

    /// Injects transport errors for the next `count` writes.
    pub fn fail_next_sets(&self, count: usize) {
        self.state.failing_sets.store(count, Ordering::SeqCst);
    }

    /// Makes every read of `key` fail with a transport error.
    pub fn fail_gets_for_key(&self, key: impl Into<String>) {
        self.state.failing_get_keys.write().insert(key.into());
    }

    /// Makes every write to `key` fail with a transport error.
    pub fn fail_sets_for_key(&self, key: impl Into<String>) {
        self.state.failing_set_keys.write().insert(key.into());
    }

    /// Makes every write to `key` fail as declined by the signer.
    pub fn reject_sets_for_key(&self, key: impl Into<String>) {
        self.state.rejected_set_keys.write().insert(key.into());
    }

    /// Queues `value` to overwrite `key` immediately after the next read of `key` completes.
    ///
    /// Reproduces another submitter writing between a read and a write of the same key.
    pub fn write_after_next_get(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state.writes_after_get.write().insert(key.into(), value.into());
    }

    /// Injects a delay into every subsequent call.
    ///
    /// Sets to 0 to disable delay.
    pub fn inject_delay(&self, millis: u64) {
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Injects an extra delay into reads of `key`.
    pub fn inject_key_delay(&self, key: impl Into<String>, millis: u64) {
        self.state.key_delays_ms.write().insert(key.into(), millis);
    }

    /// Returns the total number of `get_data` calls received.
    pub fn get_count(&self) -> usize {
        self.state.get_count.load(Ordering::SeqCst)
    }

    /// Returns the total number of `set_data` calls received.
    pub fn set_count(&self) -> usize {
        self.state.set_count.load(Ordering::SeqCst)
    }

    /// Returns the number of `set_data` calls received for `key`.
    pub fn set_count_for(&self, key: &str) -> usize {
        self.state.set_counts.read().get(key).copied().unwrap_or(0)
    }

    /// Returns the total number of `is_available` calls received.
    pub fn availability_checks(&self) -> usize {
        self.state.availability_checks.load(Ordering::SeqCst)
    }

    /// Resets all state to initial values.
    pub fn reset(&self) {
        self.state.entries.write().clear();
        self.state.failing_get_keys.write().clear();
        self.state.failing_set_keys.write().clear();
        self.state.rejected_set_keys.write().clear();
        self.state.writes_after_get.write().clear();
        self.state.key_delays_ms.write().clear();
        self.state.set_counts.write().clear();
        self.state.offline.store(false, Ordering::SeqCst);
        self.state.failing_gets.store(0, Ordering::SeqCst);
        self.state.failing_sets.store(0, Ordering::SeqCst);
        self.state.delay_ms.store(0, Ordering::SeqCst);
        self.state.get_count.store(0, Ordering::SeqCst);
        self.state.set_count.store(0, Ordering::SeqCst);
        self.state.availability_checks.store(0, Ordering::SeqCst);
        self.state.transactions.store(0, Ordering::SeqCst);
    }

    async fn apply_delay(&self, key: Option<&str>) {
        let mut millis = self.state.delay_ms.load(Ordering::SeqCst);
        if let Some(key) = key {
            millis += self.state.key_delays_ms.read().get(key).copied().unwrap_or(0);
        }
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.state.offline.load(Ordering::SeqCst) {
            return UnavailableSnafu { message: "ledger offline" }.fail();
        }
        Ok(())
    }

    /// Decrements an injected-failure counter, returning true if a failure should be injected.
    fn take_injected(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl KeyValueLedger for MemoryLedger {
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        self.state.get_count.fetch_add(1, Ordering::SeqCst);
        self.apply_delay(Some(key)).await;
        self.check_online()?;

        if Self::take_injected(&self.state.failing_gets)
            || self.state.failing_get_keys.read().contains(key)
        {
            return TransportSnafu { message: format!("injected read failure for {key}") }.fail();
        }

        let value = self.state.entries.read().get(key).cloned().unwrap_or_default();

        if let Some(interleaved) = self.state.writes_after_get.write().remove(key) {
            self.state.entries.write().insert(key.to_owned(), interleaved);
        }

        Ok(value)
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt, LedgerError> {
        self.state.set_count.fetch_add(1, Ordering::SeqCst);
        *self.state.set_counts.write().entry(key.to_owned()).or_default() += 1;
        self.apply_delay(None).await;
        self.check_online()?;

        if self.state.rejected_set_keys.read().contains(key) {
            return RejectedSnafu { message: "user rejected transaction" }.fail();
        }
        if Self::take_injected(&self.state.failing_sets)
            || self.state.failing_set_keys.read().contains(key)
        {
            return TransportSnafu { message: format!("injected write failure for {key}") }.fail();
        }

        self.state.entries.write().insert(key.to_owned(), value);
        let transaction = self.state.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(WriteReceipt::new(format!("mem-tx-{transaction}")))
    }

    async fn is_available(&self) -> Result<bool, LedgerError> {
        self.state.availability_checks.fetch_add(1, Ordering::SeqCst);
        self.apply_delay(None).await;
        Ok(!self.state.offline.load(Ordering::SeqCst))
    }
}
