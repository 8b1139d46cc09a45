//! Fuzz target for the stored index array.

#![no_main]

use heliowatch_types::RecordIndex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(index) = RecordIndex::from_bytes(data) {
        let bytes = index.to_bytes();
        assert!(bytes.is_ok(), "encode failed after successful decode");
        if let Ok(bytes) = bytes {
            let again = RecordIndex::from_bytes(&bytes).ok();
            assert_eq!(again, Some(index), "index roundtrip mismatch");
        }
    }
});
