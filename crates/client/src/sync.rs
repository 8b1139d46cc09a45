//! Synchronisation of the ledger into a [`Snapshot`].
//!
//! One pass reads the index, fetches every indexed record with bounded
//! concurrency, decodes what it can and skips the rest. A record that cannot
//! be read or decoded never aborts the pass; only an unavailable ledger or an
//! unreadable index does.

use std::{cmp::Reverse, collections::HashSet, fmt};

use futures::{StreamExt, stream};
use heliowatch_kv::KeyIndexStore;
use heliowatch_types::{DecodedRecord, Record, RecordCodec, RecordId, config::SyncConfig};
use snafu::ResultExt;

use crate::error::{
    AvailabilityProbeSnafu, IndexUnavailableSnafu, ServiceUnavailableSnafu, SyncError,
};

/// Why an indexed id did not make it into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing is stored under the record key.
    Missing,
    /// Reading the record key failed.
    ReadFailed(String),
    /// The stored value could not be decoded.
    Malformed(String),
    /// The id already appeared earlier in the index.
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("record missing"),
            Self::ReadFailed(reason) => write!(f, "read failed: {reason}"),
            Self::Malformed(reason) => write!(f, "malformed record: {reason}"),
            Self::Duplicate => f.write_str("duplicate index entry"),
        }
    }
}

/// An indexed id that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// The skipped id.
    pub id: RecordId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Result of one synchronisation pass.
///
/// Records are ordered newest first. Records with equal timestamps keep
/// their index order. Skipped ids are listed in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: Vec<Record>,
    skipped: Vec<SkippedRecord>,
}

impl Snapshot {
    /// Builds a snapshot from records given in index order.
    pub fn new(mut records: Vec<Record>, skipped: Vec<SkippedRecord>) -> Self {
        // `sort_by_key` is stable, which keeps index order among equal timestamps.
        records.sort_by_key(|record| Reverse(record.timestamp));
        Self { records, skipped }
    }

    /// Builds a snapshot with no skipped ids.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(records, Vec::new())
    }

    /// Returns the records, newest first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the skipped ids.
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Returns the number of skipped ids.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record with `id`, if present.
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|record| &record.id == id)
    }
}

/// Reads the ledger into snapshots.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: KeyIndexStore,
    codec: RecordCodec,
    config: SyncConfig,
}

impl SyncEngine {
    /// Creates an engine with the default codec and fan-out.
    pub fn new(store: KeyIndexStore) -> Self {
        Self::with_config(store, RecordCodec::default(), SyncConfig::default())
    }

    /// Creates an engine with an explicit codec and fan-out.
    pub fn with_config(store: KeyIndexStore, codec: RecordCodec, config: SyncConfig) -> Self {
        Self { store, codec, config }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &KeyIndexStore {
        &self.store
    }

    /// Returns the record codec.
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Runs one synchronisation pass.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ServiceUnavailable`] without reading anything if
    /// the ledger is not serving, [`SyncError::AvailabilityProbe`] if asking
    /// fails, or [`SyncError::IndexUnavailable`] if the index cannot be read.
    #[tracing::instrument(skip(self), fields(fan_out = self.config.fan_out))]
    pub async fn synchronize(&self) -> Result<Snapshot, SyncError> {
        let available = self.store.is_available().await.context(AvailabilityProbeSnafu)?;
        if !available {
            tracing::warn!("ledger unavailable, synchronisation aborted");
            return ServiceUnavailableSnafu.fail();
        }

        let index = self.store.read_index().await.context(IndexUnavailableSnafu)?;

        let mut seen = HashSet::with_capacity(index.len());
        let mut pending = Vec::with_capacity(index.len());
        let mut outcomes = Vec::new();
        for (position, id) in index.iter().enumerate() {
            if seen.insert(id) {
                pending.push((position, id.clone()));
            } else {
                outcomes.push((position, id.clone(), Err(SkipReason::Duplicate)));
            }
        }

        let engine = self;
        let fetched: Vec<_> = stream::iter(pending)
            .map(|(position, id)| async move {
                let outcome = engine.fetch(&id).await;
                (position, id, outcome)
            })
            .buffer_unordered(self.config.fan_out)
            .collect()
            .await;
        outcomes.extend(fetched);
        outcomes.sort_by_key(|(position, ..)| *position);

        let mut records = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (_, id, outcome) in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::warn!(id = %id, reason = %reason, "skipping record");
                    skipped.push(SkippedRecord { id, reason });
                },
            }
        }

        let snapshot = Snapshot::new(records, skipped);
        tracing::debug!(
            indexed = index.len(),
            records = snapshot.len(),
            skipped = snapshot.skipped_count(),
            "synchronisation complete"
        );
        Ok(snapshot)
    }

    async fn fetch(&self, id: &RecordId) -> Result<Record, SkipReason> {
        match self.store.read_record(id).await {
            Err(e) => Err(SkipReason::ReadFailed(e.to_string())),
            Ok(None) => Err(SkipReason::Missing),
            Ok(Some(bytes)) => match self.codec.decode_record(id, &bytes) {
                DecodedRecord::Decoded(record) => Ok(record),
                DecodedRecord::Malformed(reason) => Err(SkipReason::Malformed(reason)),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use heliowatch_kv::MemoryLedger;
    use heliowatch_test_utils::{fixtures, strategies::arb_record};
    use proptest::prelude::*;

    use super::*;

    fn engine_over(ledger: &MemoryLedger) -> SyncEngine {
        SyncEngine::new(KeyIndexStore::new(Arc::new(ledger.clone())))
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.records().iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_ledger_gives_empty_snapshot() {
        let ledger = MemoryLedger::new();
        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.skipped_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_reads_nothing() {
        let ledger = MemoryLedger::new();
        ledger.set_available(false);
        let err = engine_over(&ledger).synchronize().await.unwrap_err();
        assert!(matches!(err, SyncError::ServiceUnavailable));
        assert_eq!(ledger.get_count(), 0);
        assert_eq!(ledger.availability_checks(), 1);
    }

    #[tokio::test]
    async fn test_index_read_failure_aborts() {
        let ledger = MemoryLedger::new();
        ledger.fail_gets_for_key("spaceweather_keys");
        let err = engine_over(&ledger).synchronize().await.unwrap_err();
        assert!(matches!(err, SyncError::IndexUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_index_aborts() {
        let ledger = MemoryLedger::new();
        ledger.put_raw("spaceweather_keys", "not json");
        let err = engine_over(&ledger).synchronize().await.unwrap_err();
        assert!(matches!(err, SyncError::IndexUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_sorted_newest_first() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[
            fixtures::record("a", 100),
            fixtures::record("b", 300),
            fixtures::record("c", 200),
        ]);
        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_index_order() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[
            fixtures::record("first", 50),
            fixtures::record("second", 50),
            fixtures::record("newer", 60),
            fixtures::record("third", 50),
        ]);
        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["newer", "first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[
            fixtures::record("A", 10),
            fixtures::record("B", 30),
            fixtures::record("C", 20),
        ]);
        ledger.put_raw("spaceweather_B", "{\"data\": truncated");

        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["C", "A"]);
        assert_eq!(snapshot.skipped_count(), 1);
        assert_eq!(snapshot.skipped()[0].id.as_str(), "B");
        assert!(matches!(snapshot.skipped()[0].reason, SkipReason::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_and_unreadable_records_are_skipped() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[
            fixtures::record("ok", 1),
            fixtures::record("gone", 2),
            fixtures::record("flaky", 3),
        ]);
        ledger.put_raw("spaceweather_gone", Vec::new());
        ledger.fail_gets_for_key("spaceweather_flaky");

        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["ok"]);
        let reasons: Vec<_> = snapshot.skipped().iter().map(|s| s.reason.clone()).collect();
        assert_eq!(reasons[0], SkipReason::Missing);
        assert!(matches!(reasons[1], SkipReason::ReadFailed(_)));
    }

    #[tokio::test]
    async fn test_duplicate_index_entries_skipped() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[fixtures::record("x", 1)]);
        ledger.put_raw("spaceweather_keys", r#"["x","x"]"#);

        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.skipped(), &[SkippedRecord {
            id: "x".into(),
            reason: SkipReason::Duplicate
        }]);
        assert_eq!(ledger.get_count(), 2);
    }

    #[tokio::test]
    async fn test_synchronize_is_idempotent() {
        let ledger = MemoryLedger::new();
        let records: Vec<_> = (0..20).map(|i| fixtures::record(&format!("r{i}"), i % 4)).collect();
        fixtures::seed(&ledger, &records);
        ledger.put_raw("spaceweather_r7", "garbage");
        let engine = engine_over(&ledger);

        let first = engine.synchronize().await.unwrap();
        let second = engine.synchronize().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_independent_of_completion_order() {
        let ledger = MemoryLedger::new();
        fixtures::seed(&ledger, &[
            fixtures::record("slow", 5),
            fixtures::record("fast", 5),
        ]);
        ledger.inject_key_delay("spaceweather_slow", 200);

        let snapshot = engine_over(&ledger).synchronize().await.unwrap();
        assert_eq!(ids(&snapshot), vec!["slow", "fast"]);
    }

    proptest! {
        #[test]
        fn prop_snapshot_ordering(records in proptest::collection::vec(arb_record(), 0..40)) {
            // Ids encode index position so stability can be checked.
            let records: Vec<Record> = records
                .into_iter()
                .enumerate()
                .map(|(i, record)| Record { id: format!("{i:04}").into(), ..record })
                .collect();
            let snapshot = Snapshot::from_records(records.clone());
            let sorted = snapshot.records();
            prop_assert_eq!(sorted.len(), records.len());
            for pair in sorted.windows(2) {
                prop_assert!(pair[0].timestamp >= pair[1].timestamp);
                if pair[0].timestamp == pair[1].timestamp {
                    prop_assert!(pair[0].id < pair[1].id);
                }
            }
        }
    }
}
