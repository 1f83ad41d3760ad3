//! safelog: a structured logger that is safe to point at untrusted input.
//!
//! Every entry is level-gated, sanitized (size cap, sensitive-data
//! redaction, CR/LF escaping), rendered once, and fanned out to all
//! configured writers. Writer failures are counted, never propagated to
//! the logging call.
//!
//! # Usage
//!
//! ```no_run
//! use sl_core::{log_info, Field, FileOutput, LogLevel, Logger, LoggerConfig};
//! use sl_filter::SecurityConfig;
//! use sl_writer::{ConsoleTarget, FileWriterConfig};
//!
//! let config = LoggerConfig::from_env(Some(LogLevel::Debug), None)
//!     .with_console(ConsoleTarget::Stderr)
//!     .with_file(
//!         FileOutput::new("/var/log/app/app.log")
//!             .with_config(FileWriterConfig::default().with_compress(true))
//!             .with_async(4096),
//!     )
//!     .with_security(SecurityConfig::full());
//! let logger = Logger::new(config)?;
//!
//! logger.info_with("user login", &[Field::new("user", "alice"), Field::new("password", "x")]);
//! log_info!(logger, "served {} requests", 42);
//! logger.close()?;
//! # Ok::<(), sl_core::LoggerError>(())
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod format;
pub mod global;
pub mod level;
pub mod logger;
mod macros;

pub use config::{
    ErrorHook, FileOutput, LogFormat, LoggerConfig, WriterFailure, ENV_FORMAT, ENV_LEVEL,
};
pub use error::{LoggerError, Result};
pub use field::Field;
pub use format::{
    FormatError, FormatOptions, Formatter, JsonFormatter, Record, TextFormatter,
    DEFAULT_TIME_LAYOUT,
};
pub use global::{
    debug, debug_with, default_logger, error, error_with, info, info_with, log, set_default, warn,
    warn_with,
};
pub use level::{level_name, LogLevel};
pub use logger::Logger;
