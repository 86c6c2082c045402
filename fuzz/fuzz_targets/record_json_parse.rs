//! Fuzz target for page record JSON parsing.
//!
//! Parsed records are also run through validation, which must never panic
//! on whatever numbers the parser lets through.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mangalabel::ir::io_json::from_json_slice;
use mangalabel::validation::{validate_record, ValidateOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(record) = from_json_slice(data) {
        let _ = validate_record(&record, &ValidateOptions::default());
    }
});
