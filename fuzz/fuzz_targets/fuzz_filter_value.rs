//! Fuzz target for structured field sanitization.
//!
//! Arbitrary JSON values under arbitrary field names must filter without
//! panicking, and sensitive names must always come back redacted.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sl_filter::{SecurityConfig, SecurityFilter, REDACTED};

fuzz_target!(|input: (String, &[u8])| {
    let (name, json) = input;
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(json) else {
        return;
    };

    let filter = SecurityFilter::new(SecurityConfig::basic());
    let _ = filter.filter_value(&name, &value);

    let redacted = filter.filter_value("password", &value);
    assert_eq!(redacted, serde_json::Value::String(REDACTED.to_string()));
});
