//! Ready-made records and ledger seeding.

use heliowatch_kv::MemoryLedger;
use heliowatch_types::{
    ImpactCategory, Record, RecordCodec, RecordId, RecordIndex, ReportDraft, Severity,
    config::LedgerKeysConfig,
};

/// Identity used by fixtures.
pub const IDENTITY: &str = "0x71c7656ec7ab88b098defb751b7401b5f6d8976f";

/// A valid draft: severity 3, power grid impact in Texas.
pub fn draft() -> ReportDraft {
    ReportDraft::new(3, ImpactCategory::POWER_GRID, "Texas").with_details("relay trips at dusk")
}

/// A record with the given id and timestamp and otherwise fixed fields.
pub fn record(id: &str, timestamp: i64) -> Record {
    let draft = draft();
    Record {
        id: RecordId::new(id),
        encoded_payload: RecordCodec::default().encode(&draft).expect("fixture draft encodes"),
        timestamp,
        submitter_id: IDENTITY.to_owned(),
        severity: Severity::new(draft.severity).expect("fixture severity in range"),
        impact_category: draft.impact_category,
        location: draft.location,
    }
}

/// Writes `records` and an index listing them, in order, with the default key layout.
///
/// Uses raw seeding, so call counters stay at zero.
pub fn seed(ledger: &MemoryLedger, records: &[Record]) {
    let keys = LedgerKeysConfig::default();
    let codec = RecordCodec::default();
    let index = RecordIndex::from_ids(records.iter().map(|record| record.id.clone()));
    ledger.put_raw(keys.index_key.clone(), index.to_bytes().expect("index encodes"));
    for record in records {
        let bytes = codec.encode_record(record).expect("record encodes");
        ledger.put_raw(keys.record_key(&record.id), bytes);
    }
}

/// The stored envelope bytes of [`record`]`(id, timestamp)`.
pub fn record_bytes(id: &str, timestamp: i64) -> Vec<u8> {
    RecordCodec::default().encode_record(&record(id, timestamp)).expect("record encodes")
}
