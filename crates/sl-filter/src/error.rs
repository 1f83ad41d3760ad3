//! Error types for the security filter.

use thiserror::Error;

/// Result type for filter configuration.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised while configuring a filter.
///
/// Filtering itself never fails; every variant here is a construction-time
/// or `add_pattern`-time configuration error.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Pattern source was empty.
    #[error("pattern error: empty pattern")]
    EmptyPattern,

    /// Pattern source exceeded the accepted length.
    #[error("pattern error: pattern is {len} bytes, limit is {limit}")]
    PatternTooLong { len: usize, limit: usize },

    /// Failed to compile a regex pattern.
    #[error("pattern error: {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown preset name.
    #[error("unknown filter preset: {0}")]
    UnknownPreset(String),
}
