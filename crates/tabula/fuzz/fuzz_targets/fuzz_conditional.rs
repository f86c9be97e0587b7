//! Fuzz target for conditional spec parsing.
//!
//! Arbitrary JSON must either parse into specs whose keys enumerate cleanly
//! or be rejected with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabula::partition::{ConditionalSettings, Predicate, composite_keys};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10_000 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = Predicate::parse_comparator(text);

    if let Ok(settings) = ConditionalSettings::from_json_str(text) {
        for (_, spec) in settings.iter() {
            let expected: usize = spec.parents.iter().map(|p| p.buckets.len()).product();
            if expected <= 10_000 {
                assert_eq!(composite_keys(&spec.parents).len(), expected);
            }
        }
    }
});
