//! Output sanitization for safelog.
//!
//! This crate turns an untrusted log line (or structured field value) into a
//! line that is safe to persist.
//!
//! # Key Features
//!
//! - **Size capping**: messages over the configured limit are truncated with a
//!   visible marker before any regex runs, which bounds redaction cost.
//! - **Sensitive data redaction**: preset rule sets for credentials and PII,
//!   extensible at runtime with [`SensitiveDataFilter::add_pattern`].
//! - **Field-name filtering**: values of fields named like `password` or
//!   `api_key` are replaced outright.
//! - **Injection escaping**: CR and LF are always escaped so one call can
//!   never forge a second log record.
//!
//! # Example
//!
//! ```
//! use sl_filter::{SecurityConfig, SecurityFilter};
//!
//! let filter = SecurityFilter::new(SecurityConfig::basic());
//! let line = filter.filter_message("login password=hunter2\n[ERROR] forged");
//! assert_eq!(line, "login password=[REDACTED]\\n[ERROR] forged");
//! ```

pub mod error;
pub mod security;
pub mod sensitive;

pub use error::{FilterError, Result};
pub use security::{
    escape_line_breaks, truncate_message, FilterPreset, SecurityConfig, SecurityFilter,
    DEFAULT_MAX_MESSAGE_SIZE, TRUNCATION_MARKER,
};
pub use sensitive::{
    compile_pattern, PatternKind, RedactionRule, SensitiveDataFilter, MAX_PATTERN_LENGTH, REDACTED,
};
