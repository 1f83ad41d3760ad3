//! The dispatching logger.
//!
//! An entry passes the level gate, has its message and field values
//! sanitized, is rendered once by the formatter, and the resulting line is
//! written to every writer in order. A failing writer is counted and
//! reported but never stops delivery to the others, and never surfaces as
//! an error to the logging call.

use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Local;
use sl_filter::{SecurityConfig, SecurityFilter};
use sl_writer::{
    AsyncWriter, BufferedWriter, ConsoleSink, ConsoleTarget, RotatingFileWriter, Sink, WriteError,
};
use tracing::{debug, warn};

use crate::config::{ErrorHook, FileOutput, LoggerConfig, WriterFailure};
use crate::error::{LoggerError, Result};
use crate::field::Field;
use crate::format::{FormatOptions, Formatter, Record, TextFormatter};
use crate::level::LogLevel;

pub struct Logger {
    level: AtomicU8,
    formatter: Arc<dyn Formatter>,
    options: FormatOptions,
    security: SecurityFilter,
    writers: Vec<Box<dyn Sink>>,
    /// Held for reading while an entry is delivered, for writing by `close`.
    closed: RwLock<bool>,
    errors: AtomicU64,
    error_hook: Option<ErrorHook>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("options", &self.options)
            .field("writers", &self.writers.len())
            .field("closed", &self.is_closed())
            .field("errors", &self.error_count())
            .finish_non_exhaustive()
    }
}

fn open_file(output: FileOutput) -> Result<Box<dyn Sink>> {
    let file = RotatingFileWriter::open(output.path, output.config)?;
    let sink: Box<dyn Sink> = match (output.buffer_size, output.async_capacity) {
        (None, None) => Box::new(file),
        (Some(size), None) => Box::new(BufferedWriter::new(file, size)),
        (None, Some(capacity)) => Box::new(AsyncWriter::new(file, capacity)?),
        (Some(size), Some(capacity)) => {
            Box::new(AsyncWriter::new(BufferedWriter::new(file, size), capacity)?)
        }
    };
    Ok(sink)
}

impl Logger {
    /// Build a logger, opening every configured destination.
    ///
    /// Writers are ordered file, console, then custom writers. Fails on an
    /// empty or oversized writer set, an unusable time layout, or a file
    /// that cannot be opened.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        let count = config.writer_count();
        if count == 0 {
            return Err(LoggerError::NoWriters);
        }
        let max = config.security.max_writers;
        if max > 0 && count > max {
            return Err(LoggerError::TooManyWriters { count, max });
        }
        config.options.validate()?;

        let LoggerConfig {
            level,
            format,
            options,
            console,
            file,
            security,
            formatter,
            writers: custom,
            error_hook,
        } = config;

        let mut writers: Vec<Box<dyn Sink>> = Vec::with_capacity(count);
        if let Some(file) = file {
            writers.push(open_file(file)?);
        }
        if let Some(target) = console {
            writers.push(Box::new(ConsoleSink::new(target)));
        }
        writers.extend(custom);

        debug!(writers = writers.len(), level = %level, format = %format, "Logger initialized");
        Ok(Self::assemble(
            level,
            formatter.unwrap_or_else(|| format.formatter()),
            options,
            SecurityFilter::new(security),
            writers,
            error_hook,
        ))
    }

    /// Plain text logger on a console stream. Cannot fail.
    pub(crate) fn console(level: LogLevel, target: ConsoleTarget) -> Self {
        Self::assemble(
            level,
            Arc::new(TextFormatter),
            FormatOptions::default(),
            SecurityFilter::new(SecurityConfig::default()),
            vec![Box::new(ConsoleSink::new(target))],
            None,
        )
    }

    fn assemble(
        level: LogLevel,
        formatter: Arc<dyn Formatter>,
        options: FormatOptions,
        security: SecurityFilter,
        writers: Vec<Box<dyn Sink>>,
        error_hook: Option<ErrorHook>,
    ) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
            formatter,
            options,
            security,
            writers,
            closed: RwLock::new(false),
            errors: AtomicU64::new(0),
            error_hook,
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level as u8 >= self.level.load(Ordering::Relaxed)
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: &str) {
        self.dispatch(level, message, &[], Location::caller());
    }

    #[track_caller]
    pub fn log_with(&self, level: LogLevel, message: &str, fields: &[Field]) {
        self.dispatch(level, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: &str) {
        self.dispatch(LogLevel::Debug, message, &[], Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: &str) {
        self.dispatch(LogLevel::Info, message, &[], Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, message: &str) {
        self.dispatch(LogLevel::Warn, message, &[], Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: &str) {
        self.dispatch(LogLevel::Error, message, &[], Location::caller());
    }

    #[track_caller]
    pub fn debug_with(&self, message: &str, fields: &[Field]) {
        self.dispatch(LogLevel::Debug, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn info_with(&self, message: &str, fields: &[Field]) {
        self.dispatch(LogLevel::Info, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn warn_with(&self, message: &str, fields: &[Field]) {
        self.dispatch(LogLevel::Warn, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn error_with(&self, message: &str, fields: &[Field]) {
        self.dispatch(LogLevel::Error, message, fields, Location::caller());
    }

    /// Log at FATAL, close every writer, and exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: &str) -> ! {
        self.fatal_with(message, &[])
    }

    #[track_caller]
    pub fn fatal_with(&self, message: &str, fields: &[Field]) -> ! {
        self.dispatch(LogLevel::Fatal, message, fields, Location::caller());
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close writers before exit");
        }
        std::process::exit(1)
    }

    fn dispatch(
        &self,
        level: LogLevel,
        message: &str,
        fields: &[Field],
        caller: &'static Location<'static>,
    ) {
        if !self.enabled(level) {
            return;
        }
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return;
        }

        let message = self.security.filter_message(message);
        let fields: Vec<Field> = fields
            .iter()
            .map(|f| Field {
                key: self.security.filter_key(&f.key),
                value: self.security.filter_value(&f.key, &f.value),
            })
            .collect();

        let record = Record {
            level,
            time: Local::now(),
            caller: Some(caller),
            message: &message,
            fields: &fields,
            options: &self.options,
        };
        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, level = %level, "Dropping log entry: formatter failed");
                return;
            }
        };

        let failures: Vec<(usize, WriteError)> = self
            .writers
            .iter()
            .enumerate()
            .filter_map(|(writer_index, writer)| {
                writer.write(line.as_bytes()).err().map(|e| (writer_index, e))
            })
            .collect();
        // The hook may log through this logger again
        drop(closed);

        for (writer_index, error) in &failures {
            self.report_failure(*writer_index, error);
        }
    }

    fn report_failure(&self, writer_index: usize, error: &WriteError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(writer_index, error = %error, "Log writer failed");
        if let Some(hook) = &self.error_hook {
            hook(&WriterFailure {
                writer_index,
                error,
            });
        }
    }

    /// Flush every writer. All writers are attempted; the first error is returned.
    pub fn flush(&self) -> Result<()> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Ok(());
        }

        let mut first_err = None;
        for (writer_index, writer) in self.writers.iter().enumerate() {
            if let Err(e) = writer.flush() {
                warn!(writer_index, error = %e, "Log writer flush failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), |e| Err(LoggerError::Writer(e)))
    }

    /// Close every writer once. Later calls, and any logging after this
    /// returns, are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Ok(());
        }
        *closed = true;

        let mut first_err = None;
        for (writer_index, writer) in self.writers.iter().enumerate() {
            if let Err(e) = writer.close() {
                warn!(writer_index, error = %e, "Log writer close failed");
                first_err.get_or_insert(e);
            }
        }
        debug!(errors = self.error_count(), "Logger closed");
        first_err.map_or(Ok(()), |e| Err(LoggerError::Writer(e)))
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writer and formatter failures since construction.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FormatError, FormatOptions};
    use crate::LoggerConfig;
    use serde_json::json;
    use sl_writer::IoSink;
    use std::sync::atomic::AtomicUsize;

    fn capture() -> (Arc<IoSink<Vec<u8>>>, LoggerConfig) {
        let sink = Arc::new(IoSink::new(Vec::new()));
        let config = LoggerConfig::default()
            .with_options(FormatOptions::bare())
            .with_writer(sink.clone());
        (sink, config)
    }

    fn output(sink: &IoSink<Vec<u8>>) -> String {
        sink.with_inner(|buf| String::from_utf8(buf.clone()).unwrap())
            .unwrap_or_default()
    }

    struct BrokenSink;

    impl Sink for BrokenSink {
        fn write(&self, _buf: &[u8]) -> sl_writer::Result<usize> {
            Err(WriteError::Io(std::io::Error::other("disk on fire")))
        }

        fn close(&self) -> sl_writer::Result<()> {
            Ok(())
        }
    }

    struct FailingFormatter;

    impl Formatter for FailingFormatter {
        fn format(&self, _record: &Record<'_>) -> std::result::Result<String, FormatError> {
            Err(FormatError::Custom("nope".to_string()))
        }
    }

    #[test]
    fn test_no_writers_rejected() {
        assert!(matches!(
            Logger::new(LoggerConfig::default()),
            Err(LoggerError::NoWriters)
        ));
    }

    #[test]
    fn test_writer_limit() {
        let config = LoggerConfig::default()
            .with_console(ConsoleTarget::Stderr)
            .with_writer(IoSink::new(Vec::new()))
            .with_writer(IoSink::new(Vec::new()))
            .with_security(SecurityConfig::default().with_max_writers(2));
        assert!(matches!(
            Logger::new(config),
            Err(LoggerError::TooManyWriters { count: 3, max: 2 })
        ));
    }

    #[test]
    fn test_bad_time_layout_rejected() {
        let (_sink, config) = capture();
        let config = config.with_options(FormatOptions::default().with_time_layout("%!"));
        assert!(matches!(Logger::new(config), Err(LoggerError::Format(_))));
    }

    #[test]
    fn test_level_gate() {
        let (sink, config) = capture();
        let logger = Logger::new(config.with_level(LogLevel::Warn)).unwrap();

        logger.debug("hidden");
        logger.info("hidden");
        logger.warn("shown");
        assert_eq!(output(&sink), "shown\n");

        logger.set_level(LogLevel::Debug);
        assert_eq!(logger.level(), LogLevel::Debug);
        assert!(logger.enabled(LogLevel::Debug));
        logger.debug("now shown");
        assert_eq!(output(&sink), "shown\nnow shown\n");
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let sink = Arc::new(IoSink::new(Vec::new()));
        let config = LoggerConfig::default()
            .with_options(FormatOptions::bare().with_caller(true))
            .with_writer(sink.clone());
        let logger = Logger::new(config).unwrap();

        let line = line!() + 1;
        logger.info("here");
        assert_eq!(output(&sink), format!("logger.rs:{} here\n", line));
    }

    #[test]
    fn test_message_and_fields_sanitized() {
        let (sink, config) = capture();
        let logger = Logger::new(config.with_security(SecurityConfig::basic())).unwrap();

        logger.info_with(
            "user input: ok\n[ERROR] forged",
            &[
                Field::new("password", "hunter2"),
                Field::new("note", "token=abc123"),
                Field::new("count", 7),
            ],
        );
        let out = output(&sink);
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("user input: ok\\n[ERROR] forged "));
        assert!(out.contains("password=[REDACTED]"));
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("abc123"));
        assert!(out.contains("count=7"));
    }

    #[test]
    fn test_json_output() {
        let (sink, config) = capture();
        let logger = Logger::new(config.with_format(crate::LogFormat::Json)).unwrap();
        logger.error_with("boom", &[Field::new("code", 500)]);

        let parsed: serde_json::Value = serde_json::from_str(output(&sink).trim_end()).unwrap();
        assert_eq!(parsed, json!({"message": "boom", "fields": {"code": 500}}));
    }

    #[test]
    fn test_failing_writer_does_not_block_others() {
        let good = Arc::new(IoSink::new(Vec::new()));
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let seen = hook_calls.clone();
        let config = LoggerConfig::default()
            .with_options(FormatOptions::bare())
            .with_writer(BrokenSink)
            .with_writer(good.clone())
            .with_error_hook(move |failure| {
                assert_eq!(failure.writer_index, 0);
                seen.fetch_add(1, Ordering::SeqCst);
            });
        let logger = Logger::new(config).unwrap();

        logger.info("one");
        logger.info("two");
        assert_eq!(output(&good), "one\ntwo\n");
        assert_eq!(logger.error_count(), 2);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_formatter_failure_counted() {
        let (sink, config) = capture();
        let logger = Logger::new(config.with_formatter(Arc::new(FailingFormatter))).unwrap();
        logger.info("lost");
        assert_eq!(output(&sink), "");
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_silences_logging() {
        let (sink, config) = capture();
        let logger = Logger::new(config).unwrap();
        logger.info("before");
        assert_eq!(output(&sink), "before\n");

        logger.close().unwrap();
        logger.close().unwrap();
        assert!(logger.is_closed());

        logger.info("after");
        logger.flush().unwrap();
        assert_eq!(logger.error_count(), 0);
    }

    /// Fails every line that mentions "boom".
    struct PickySink;

    impl Sink for PickySink {
        fn write(&self, buf: &[u8]) -> sl_writer::Result<usize> {
            if buf.windows(4).any(|w| w == b"boom") {
                return Err(WriteError::Io(std::io::Error::other("rejected")));
            }
            Ok(buf.len())
        }

        fn close(&self) -> sl_writer::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_error_hook_can_log_through_logger() {
        let good = Arc::new(IoSink::new(Vec::new()));
        let slot: Arc<std::sync::OnceLock<std::sync::Weak<Logger>>> = Arc::default();
        let hook_slot = slot.clone();
        let config = LoggerConfig::default()
            .with_options(FormatOptions::bare())
            .with_writer(PickySink)
            .with_writer(good.clone())
            .with_error_hook(move |failure| {
                if let Some(logger) = hook_slot.get().and_then(std::sync::Weak::upgrade) {
                    logger.warn(&format!("writer {} failed", failure.writer_index));
                }
            });
        let logger = Arc::new(Logger::new(config).unwrap());
        slot.set(Arc::downgrade(&logger)).unwrap();

        logger.info("boom");
        assert_eq!(output(&good), "boom\nwriter 0 failed\n");
        assert_eq!(logger.error_count(), 1);
    }
}
