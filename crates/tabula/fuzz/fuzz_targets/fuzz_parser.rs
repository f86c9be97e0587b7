//! Fuzz target for the data parser.
//!
//! The parser must never panic on malformed delimited input, and whatever
//! it returns must have equal-length columns.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tabula::{MetadataSet, Parser};

fuzz_target!(|data: &[u8]| {
    // Only process reasonable-sized inputs to avoid OOM
    if data.len() > 100_000 {
        return;
    }

    let metadata = MetadataSet::new();
    let parser = Parser::new();

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(table) = parser.parse_str(text, &metadata) {
            for (_, values) in table.columns() {
                assert_eq!(values.len(), table.row_count());
            }
        }
    }

    if let Ok(mut temp_file) = tempfile::NamedTempFile::new() {
        if temp_file.write_all(data).is_ok() {
            let _ = parser.parse_file(temp_file.path(), &metadata);
        }
    }
});
