//! Logger configuration.
//!
//! Supports configuration via:
//! - Builder methods on [`LoggerConfig`]
//! - Environment variables (`SL_LOG`, `SL_LOG_FORMAT`)
//! - Explicit overrides passed to [`LoggerConfig::from_env`] (e.g. CLI flags)

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sl_filter::SecurityConfig;
use sl_writer::{ConsoleTarget, FileWriterConfig, Sink, WriteError};

use crate::format::{FormatOptions, Formatter, JsonFormatter, TextFormatter};
use crate::level::LogLevel;

/// Environment variable holding the minimum level.
pub const ENV_LEVEL: &str = "SL_LOG";

/// Environment variable holding the output format.
pub const ENV_FORMAT: &str = "SL_LOG_FORMAT";

/// Built-in output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text lines (default).
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    pub fn formatter(self) -> Arc<dyn Formatter> {
        match self {
            LogFormat::Text => Arc::new(TextFormatter),
            LogFormat::Json => Arc::new(JsonFormatter),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "human" | "console" | "pretty" => Ok(LogFormat::Text),
            "json" | "jsonl" | "structured" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// A rotating log file, optionally behind buffering and an async queue.
#[derive(Debug, Clone)]
pub struct FileOutput {
    pub path: PathBuf,
    pub config: FileWriterConfig,
    /// Queue capacity of an [`sl_writer::AsyncWriter`] in front of the file.
    pub async_capacity: Option<usize>,
    /// Size of a [`sl_writer::BufferedWriter`] in front of the file.
    pub buffer_size: Option<usize>,
}

impl FileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: FileWriterConfig::default(),
            async_capacity: None,
            buffer_size: None,
        }
    }

    pub fn with_config(mut self, config: FileWriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_async(mut self, capacity: usize) -> Self {
        self.async_capacity = Some(capacity);
        self
    }

    pub fn with_buffer(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }
}

/// A writer failure reported to the [`ErrorHook`].
#[derive(Debug)]
pub struct WriterFailure<'a> {
    /// Position of the writer: file first, then console, then custom writers.
    pub writer_index: usize,
    pub error: &'a WriteError,
}

/// Called for every failed writer delivery, on the logging thread, after
/// the entry has been offered to every writer. The hook may log through the
/// logger it is attached to; an entry that fails again re-enters the hook.
pub type ErrorHook = Arc<dyn Fn(&WriterFailure<'_>) + Send + Sync>;

/// Everything needed to build a [`crate::Logger`].
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub options: FormatOptions,
    pub console: Option<ConsoleTarget>,
    pub file: Option<FileOutput>,
    pub security: SecurityConfig,
    /// Overrides `format` when set.
    pub formatter: Option<Arc<dyn Formatter>>,
    pub writers: Vec<Box<dyn Sink>>,
    pub error_hook: Option<ErrorHook>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: LogLevel::Info,
            format: LogFormat::Text,
            options: FormatOptions::default(),
            console: None,
            file: None,
            security: SecurityConfig::default(),
            formatter: None,
            writers: Vec::new(),
            error_hook: None,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("level", &self.level)
            .field("format", &self.format)
            .field("options", &self.options)
            .field("console", &self.console)
            .field("file", &self.file)
            .field("security", &self.security)
            .field("custom_formatter", &self.formatter.is_some())
            .field("writers", &self.writers.len())
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl LoggerConfig {
    /// Create config from environment and explicit overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LoggerConfig::default();

        if let Some(val) = lookup(ENV_LEVEL) {
            match val.parse::<LogLevel>() {
                Ok(level) => config.level = level,
                Err(e) => tracing::warn!(var = ENV_LEVEL, error = %e, "Ignoring invalid log level"),
            }
        }
        if let Some(val) = lookup(ENV_FORMAT) {
            match val.parse::<LogFormat>() {
                Ok(format) => config.format = format,
                Err(e) => tracing::warn!(var = ENV_FORMAT, error = %e, "Ignoring invalid log format"),
            }
        }

        // Explicit overrides take final precedence
        if let Some(level) = cli_level {
            config.level = level;
        }
        if let Some(format) = cli_format {
            config.format = format;
        }

        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_console(mut self, target: ConsoleTarget) -> Self {
        self.console = Some(target);
        self
    }

    pub fn with_file(mut self, file: FileOutput) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Append a custom writer. Custom writers come after file and console.
    pub fn with_writer(mut self, writer: impl Sink + 'static) -> Self {
        self.writers.push(Box::new(writer));
        self
    }

    pub fn with_error_hook(
        mut self,
        hook: impl Fn(&WriterFailure<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Writers the logger will own once built.
    pub fn writer_count(&self) -> usize {
        usize::from(self.file.is_some()) + usize::from(self.console.is_some()) + self.writers.len()
    }
}
