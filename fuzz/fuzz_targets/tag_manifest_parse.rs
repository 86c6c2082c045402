//! Fuzz target for tag manifest CSV parsing.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use mangalabel::tagging::LabelTable;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(table) = LabelTable::from_csv_str(text, Path::new("fuzz.csv")) {
        let _ = table.search("smile");
    }
});
