//! Output sanitization pipeline.
//!
//! Every line handed to a sink passes through [`SecurityFilter`] in a fixed
//! order:
//!
//! 1. size cap (bounds the work done by every later step)
//! 2. sensitive-pattern redaction
//! 3. field-name redaction (structured fields only; short-circuits step 2)
//! 4. CR/LF escaping (always on)
//!
//! The truncation marker is appended after the last step, so no rule can
//! rewrite it and a capped line always ends with it.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sensitive::{SensitiveDataFilter, REDACTED};
use crate::FilterError;

/// Default message size cap (5 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;

/// Marker appended to truncated messages.
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Named sensitive-data preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    /// No sensitive-data filtering.
    #[default]
    None,
    /// Empty rule set, extended with `add_pattern`.
    Empty,
    /// Passwords, tokens, keys, card numbers.
    Basic,
    /// Basic plus PII and cloud credentials.
    Full,
}

impl FilterPreset {
    /// Build the filter for this preset.
    pub fn build(self) -> Option<Arc<SensitiveDataFilter>> {
        match self {
            FilterPreset::None => None,
            FilterPreset::Empty => Some(Arc::new(SensitiveDataFilter::empty())),
            FilterPreset::Basic => Some(Arc::new(SensitiveDataFilter::basic())),
            FilterPreset::Full => Some(Arc::new(SensitiveDataFilter::full())),
        }
    }
}

impl std::str::FromStr for FilterPreset {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(FilterPreset::None),
            "empty" => Ok(FilterPreset::Empty),
            "basic" => Ok(FilterPreset::Basic),
            "full" => Ok(FilterPreset::Full),
            _ => Err(FilterError::UnknownPreset(s.to_string())),
        }
    }
}

impl std::fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterPreset::None => "none",
            FilterPreset::Empty => "empty",
            FilterPreset::Basic => "basic",
            FilterPreset::Full => "full",
        };
        write!(f, "{}", s)
    }
}

/// Security settings owned by a logger.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Message size cap in bytes. 0 means unbounded.
    pub max_message_size: usize,
    /// Maximum number of writers a logger accepts. 0 means unbounded.
    pub max_writers: usize,
    /// Sensitive-data filter; `None` disables redaction.
    pub sensitive_filter: Option<Arc<SensitiveDataFilter>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_writers: 0,
            sensitive_filter: None,
        }
    }
}

impl SecurityConfig {
    /// Default limits with the basic sensitive-data filter.
    pub fn basic() -> Self {
        Self::default().with_preset(FilterPreset::Basic)
    }

    /// Default limits with the full sensitive-data filter.
    pub fn full() -> Self {
        Self::default().with_preset(FilterPreset::Full)
    }

    /// Set the message size cap.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the writer limit.
    pub fn with_max_writers(mut self, count: usize) -> Self {
        self.max_writers = count;
        self
    }

    /// Use a specific filter.
    pub fn with_filter(mut self, filter: Arc<SensitiveDataFilter>) -> Self {
        self.sensitive_filter = Some(filter);
        self
    }

    /// Use a named preset.
    pub fn with_preset(mut self, preset: FilterPreset) -> Self {
        self.sensitive_filter = preset.build();
        self
    }
}

/// Applies the sanitization pipeline described in the module docs.
#[derive(Debug, Clone)]
pub struct SecurityFilter {
    config: SecurityConfig,
}

impl SecurityFilter {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Sanitize a free-text message.
    pub fn filter_message(&self, text: &str) -> String {
        let prefix = capped_prefix(text, self.config.max_message_size);
        let body = prefix.unwrap_or(text);
        let redacted = match &self.config.sensitive_filter {
            Some(filter) => filter.redact(body),
            None => Cow::Borrowed(body),
        };
        let mut out = escape_line_breaks(&redacted).into_owned();
        if prefix.is_some() {
            out.push_str(TRUNCATION_MARKER);
        }
        out
    }

    /// Sanitize a single structured field value.
    ///
    /// A sensitive field name replaces the whole value without running the
    /// pattern rules on it.
    pub fn filter_field(&self, name: &str, value: &str) -> String {
        if self.is_sensitive_field(name) {
            return REDACTED.to_string();
        }
        self.filter_message(value)
    }

    /// Sanitize a structured field value of any JSON shape.
    ///
    /// Strings are filtered, object members are checked by key, arrays are
    /// filtered element-wise, and numbers, bools and null pass through.
    pub fn filter_value(&self, name: &str, value: &Value) -> Value {
        if self.is_sensitive_field(name) {
            return Value::String(REDACTED.to_string());
        }

        match value {
            Value::String(s) => Value::String(self.filter_message(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.filter_value(name, v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.filter_key(k), self.filter_value(k, v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Sanitize a field key so it cannot break the line structure.
    ///
    /// Keys are never redacted, so distinct keys stay distinct.
    pub fn filter_key(&self, name: &str) -> String {
        match capped_prefix(name, self.config.max_message_size) {
            Some(prefix) => escape_line_breaks(prefix).into_owned() + TRUNCATION_MARKER,
            None => escape_line_breaks(name).into_owned(),
        }
    }

    fn is_sensitive_field(&self, name: &str) -> bool {
        self.config
            .sensitive_filter
            .as_ref()
            .is_some_and(|f| f.is_sensitive_field_name(name))
    }
}

/// Cap `text` at `limit` bytes and append [`TRUNCATION_MARKER`].
///
/// `limit == 0` disables the cap. The cut never splits a UTF-8 code point,
/// so the kept prefix may be a few bytes shorter than `limit`.
pub fn truncate_message(text: &str, limit: usize) -> Cow<'_, str> {
    match capped_prefix(text, limit) {
        Some(prefix) => {
            let mut out = String::with_capacity(prefix.len() + TRUNCATION_MARKER.len());
            out.push_str(prefix);
            out.push_str(TRUNCATION_MARKER);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// The part of `text` kept under the cap, or `None` when it fits.
fn capped_prefix(text: &str, limit: usize) -> Option<&str> {
    if limit == 0 || text.len() <= limit {
        return None;
    }

    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(&text[..end])
}

/// Escape CR and LF as the two-character sequences `\r` and `\n`.
pub fn escape_line_breaks(text: &str) -> Cow<'_, str> {
    if !text.contains(|c: char| c == '\r' || c == '\n') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
