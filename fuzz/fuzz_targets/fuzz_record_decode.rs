//! Fuzz target for stored record envelopes and payloads.
//!
//! Arbitrary bytes read back from the ledger must never panic the decoder,
//! and any envelope that decodes must survive a re-encode unchanged.

#![no_main]

use heliowatch_types::{DecodedRecord, RecordCodec, RecordId};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = RecordCodec::default();
    let id = RecordId::new("sw-fuzz");

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = codec.decode(text);
    }

    if let DecodedRecord::Decoded(record) = codec.decode_record(&id, data) {
        let bytes = codec.encode_record(&record);
        assert!(bytes.is_ok(), "encode failed after successful decode");
        if let Ok(bytes) = bytes {
            let again = codec.try_decode_record(&id, &bytes);
            assert_eq!(again.ok(), Some(record), "envelope roundtrip mismatch");
        }
    }
});
