//! Fuzz target for level and format names read from the environment.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sl_core::{LogFormat, LogLevel};

fuzz_target!(|data: &str| {
    if let Ok(level) = data.parse::<LogLevel>() {
        assert_eq!(level.to_string().parse::<LogLevel>(), Ok(level));
    }
    let _ = data.parse::<LogFormat>();
});
