//! Fuzz target: `parse_record` / `encode_record`
//!
//! Arbitrary notifications on the telemetry channel must either parse or
//! be rejected by length.  A record that parses must re-encode to the
//! same axis bytes.
//!
//! cargo fuzz run fuzz_telemetry_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use steptosign::telemetry::{RECORD_LEN, encode_record, parse_record};

fuzz_target!(|data: &[u8]| {
    match parse_record(data) {
        Ok(record) => {
            assert_eq!(data.len(), RECORD_LEN);
            let bytes = encode_record(&record);
            assert_eq!(&bytes[..16], &data[..16]);
        }
        Err(_) => assert_ne!(data.len(), RECORD_LEN),
    }
});
