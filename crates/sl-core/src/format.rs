//! Rendering entries into lines.
//!
//! Formatters receive values that have already been sanitized. The trailing
//! newline they emit is the only line break an entry may contain.

use std::fmt::Write as _;
use std::panic::Location;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::field::Field;
use crate::level::LogLevel;

pub const DEFAULT_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("invalid time layout: {0}")]
    TimeLayout(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Which parts of an entry the built-in formatters render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub include_timestamp: bool,
    /// chrono strftime layout for text output.
    pub time_layout: String,
    pub include_level: bool,
    pub include_caller: bool,
    /// Show the caller's full source path instead of the file name.
    pub full_path: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            include_timestamp: true,
            time_layout: DEFAULT_TIME_LAYOUT.to_string(),
            include_level: true,
            include_caller: true,
            full_path: false,
        }
    }
}

impl FormatOptions {
    /// Message and fields only; handy for tests and plain pipes.
    pub fn bare() -> Self {
        Self {
            include_timestamp: false,
            include_level: false,
            include_caller: false,
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.include_timestamp = enabled;
        self
    }

    pub fn with_time_layout(mut self, layout: impl Into<String>) -> Self {
        self.time_layout = layout.into();
        self
    }

    pub fn with_level(mut self, enabled: bool) -> Self {
        self.include_level = enabled;
        self
    }

    pub fn with_caller(mut self, enabled: bool) -> Self {
        self.include_caller = enabled;
        self
    }

    pub fn with_full_path(mut self, enabled: bool) -> Self {
        self.full_path = enabled;
        self
    }

    /// Reject layouts chrono cannot render.
    pub fn validate(&self) -> Result<(), FormatError> {
        if StrftimeItems::new(&self.time_layout).any(|item| item == Item::Error) {
            return Err(FormatError::TimeLayout(self.time_layout.clone()));
        }
        Ok(())
    }
}

/// One entry as seen by a formatter.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub level: LogLevel,
    pub time: DateTime<Local>,
    pub caller: Option<&'static Location<'static>>,
    pub message: &'a str,
    pub fields: &'a [Field],
    pub options: &'a FormatOptions,
}

impl Record<'_> {
    /// `file:line` of the call site, shortened unless `full_path` is set.
    pub fn caller_display(&self) -> Option<String> {
        let caller = self.caller?;
        let file = if self.options.full_path {
            caller.file()
        } else {
            Path::new(caller.file())
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(caller.file())
        };
        Some(format!("{}:{}", file, caller.line()))
    }

    fn timestamp(&self) -> Result<String, FormatError> {
        let mut out = String::new();
        write!(out, "{}", self.time.format(&self.options.time_layout))
            .map_err(|_| FormatError::TimeLayout(self.options.time_layout.clone()))?;
        Ok(out)
    }
}

/// Turns a [`Record`] into one output line, newline included.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record<'_>) -> Result<String, FormatError>;
}

/// `[time] LEVEL file:line message key=value ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format(&self, record: &Record<'_>) -> Result<String, FormatError> {
        let opts = record.options;
        let mut parts: Vec<String> = Vec::with_capacity(4 + record.fields.len());

        if opts.include_timestamp {
            parts.push(format!("[{}]", record.timestamp()?));
        }
        if opts.include_level {
            parts.push(record.level.as_str().to_string());
        }
        if opts.include_caller {
            if let Some(caller) = record.caller_display() {
                parts.push(caller);
            }
        }
        parts.push(record.message.to_string());
        for field in record.fields {
            parts.push(format!("{}={}", field.key, text_value(&field.value)));
        }

        let mut line = parts.join(" ");
        line.push('\n');
        Ok(line)
    }
}

/// Plain strings print bare unless they contain spaces, quotes or `=`.
fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) if !s.is_empty() && !s.contains(|c: char| matches!(c, ' ' | '"' | '=')) => {
            s.clone()
        }
        other => other.to_string(),
    }
}

/// One JSON object per line: `time`, `level`, `caller`, `message`, `fields`.
///
/// Timestamps are RFC 3339 with milliseconds regardless of `time_layout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record<'_>) -> Result<String, FormatError> {
        let opts = record.options;
        let mut obj = Map::new();

        if opts.include_timestamp {
            obj.insert(
                "time".to_string(),
                Value::String(record.time.to_rfc3339_opts(SecondsFormat::Millis, false)),
            );
        }
        if opts.include_level {
            obj.insert(
                "level".to_string(),
                Value::String(record.level.as_str().to_string()),
            );
        }
        if opts.include_caller {
            if let Some(caller) = record.caller_display() {
                obj.insert("caller".to_string(), Value::String(caller));
            }
        }
        obj.insert(
            "message".to_string(),
            Value::String(record.message.to_string()),
        );
        if !record.fields.is_empty() {
            let fields: Map<String, Value> = record
                .fields
                .iter()
                .map(|f| (f.key.clone(), f.value.clone()))
                .collect();
            obj.insert("fields".to_string(), Value::Object(fields));
        }

        let mut line = serde_json::to_string(&Value::Object(obj))?;
        line.push('\n');
        Ok(line)
    }
}
