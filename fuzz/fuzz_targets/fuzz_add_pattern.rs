//! Fuzz target for runtime pattern registration.
//!
//! Arbitrary pattern sources must be accepted or rejected with an error,
//! never a panic, and an accepted pattern must be usable immediately.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sl_filter::SensitiveDataFilter;

fuzz_target!(|input: (String, String)| {
    let (pattern, sample) = input;
    let filter = SensitiveDataFilter::empty();
    if filter.add_pattern(&pattern).is_ok() {
        assert_eq!(filter.pattern_count(), 1);
        let _ = filter.redact(&sample);
    }
});
