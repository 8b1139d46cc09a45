//! Proptest strategies for heliowatch domain types.
//!
//! Generators produce well-formed values: drafts pass validation and records
//! have in-range severities. Timestamps deliberately collide often so that
//! ordering properties exercise ties.
//!
//! # Usage
//!
//! ```no_run
//! use heliowatch_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(draft in strategies::arb_draft()) {
//!         prop_assert!(heliowatch_types::validate_draft(&draft).is_ok());
//!     }
//! }
//! ```

use heliowatch_types::{ImpactCategory, Record, RecordId, ReportDraft, Severity};
use proptest::prelude::*;

/// Generates an id in the layout produced by `heliowatch_types::id::generate`.
pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
    "sw-1[0-9]{12}-[0-9a-z]{7}".prop_map(RecordId::new)
}

/// Generates a severity in `1..=5`.
pub fn arb_severity() -> impl Strategy<Value = Severity> {
    (Severity::MIN..=Severity::MAX).prop_filter_map("severity in range", Severity::new)
}

/// Generates an impact category: mostly the known ones, sometimes free text.
pub fn arb_category() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::sample::select(ImpactCategory::KNOWN.to_vec()).prop_map(str::to_owned),
        1 => "[A-Z][a-z]{2,11}( [A-Z][a-z]{2,11})?",
    ]
}

/// Generates a place name such as `Texas` or `New Ohnsk`.
pub fn arb_location() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,11}( [A-Z][a-z]{2,8})?"
}

/// Generates a submitter identity from a small pool, in mixed case.
///
/// The pool is small so that several records share a submitter.
pub fn arb_identity() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec![
            "0x71c7656ec7ab88b098defb751b7401b5f6d8976f",
            "0xab5801a7d398351b8be11c439e05c5b3259aec9b",
            "0xfe9e8709d3215310075d67e3ed32a380ccf451c8",
        ]),
        any::<bool>(),
    )
        .prop_map(|(identity, upper)| {
            if upper { identity.to_uppercase() } else { identity.to_owned() }
        })
}

/// Generates a timestamp in seconds; about half fall in a four-second window.
pub fn arb_timestamp() -> impl Strategy<Value = i64> {
    prop_oneof![
        1_700_000_000i64..1_700_000_004i64,
        1_577_836_800i64..1_893_456_000i64,
    ]
}

/// Generates a draft that passes validation.
pub fn arb_draft() -> impl Strategy<Value = ReportDraft> {
    (1u8..=5, arb_category(), arb_location(), "[ -~]{0,64}").prop_map(
        |(severity, impact_category, location, details)| ReportDraft {
            severity,
            impact_category,
            location,
            details,
        },
    )
}

/// Generates a published record with an opaque payload.
pub fn arb_record() -> impl Strategy<Value = Record> {
    (
        arb_record_id(),
        "FHE-[A-Za-z0-9+/]{0,40}",
        arb_timestamp(),
        arb_identity(),
        arb_severity(),
        arb_category(),
        arb_location(),
    )
        .prop_map(
            |(id, encoded_payload, timestamp, submitter_id, severity, impact_category, location)| {
                Record {
                    id,
                    encoded_payload,
                    timestamp,
                    submitter_id,
                    severity,
                    impact_category,
                    location,
                }
            },
        )
}
