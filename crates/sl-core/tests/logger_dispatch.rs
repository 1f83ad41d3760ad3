//! End-to-end logger tests with real files and threads.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use serde_json::Value;
use sl_core::{
    log_debug, log_info, Field, FileOutput, FormatOptions, LogFormat, LogLevel, Logger,
    LoggerConfig,
};
use sl_filter::SecurityConfig;
use sl_writer::{FileWriterConfig, IoSink, Sink, WriteError};
use tempfile::TempDir;

fn captured(config: LoggerConfig) -> (Arc<IoSink<Vec<u8>>>, Logger) {
    let sink = Arc::new(IoSink::new(Vec::new()));
    let logger = Logger::new(config.with_writer(sink.clone())).unwrap();
    (sink, logger)
}

fn text(sink: &IoSink<Vec<u8>>) -> String {
    sink.with_inner(|buf| String::from_utf8(buf.clone()).unwrap())
        .unwrap_or_default()
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_logging_to_file_keeps_every_line_whole() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    let config = LoggerConfig::default()
        .with_format(LogFormat::Json)
        .with_file(FileOutput::new(&path).with_config(FileWriterConfig::unlimited()));
    let logger = Arc::new(Logger::new(config).unwrap());

    let threads = 8;
    let per_thread = 250;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    logger.info_with(
                        "tick",
                        &[Field::new("thread", t), Field::new("seq", i)],
                    );
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    logger.close().unwrap();
    logger.close().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let mut seen = HashSet::new();
    for line in contents.lines() {
        let entry: Value = serde_json::from_str(line).unwrap();
        assert_eq!(entry["level"], "INFO");
        let key = (
            entry["fields"]["thread"].as_u64().unwrap(),
            entry["fields"]["seq"].as_u64().unwrap(),
        );
        assert!(seen.insert(key), "duplicate entry {:?}", key);
    }
    assert_eq!(seen.len(), threads * per_thread);
    assert_eq!(logger.error_count(), 0);
}

#[test]
fn async_file_output_drains_on_close() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("async.log");
    let config = LoggerConfig::default()
        .with_options(FormatOptions::bare())
        .with_file(FileOutput::new(&path).with_async(4096).with_buffer(1024));
    let logger = Logger::new(config).unwrap();

    for i in 0..500 {
        logger.info(&format!("entry {}", i));
    }
    logger.close().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 500);
    assert!(contents.ends_with("entry 499\n"));
}

#[test]
fn logging_after_close_is_silently_ignored() {
    let (sink, logger) = captured(LoggerConfig::default().with_options(FormatOptions::bare()));
    logger.info("kept");
    let before = text(&sink);
    logger.close().unwrap();

    let logger = Arc::new(logger);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let logger = logger.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    logger.error("dropped");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(before, "kept\n");
    assert_eq!(logger.error_count(), 0);
}

// ============================================================================
// Failure isolation
// ============================================================================

struct FlakySink {
    calls: AtomicUsize,
}

impl Sink for FlakySink {
    fn write(&self, buf: &[u8]) -> sl_writer::Result<usize> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            Err(WriteError::Io(std::io::Error::other("transient")))
        } else {
            Ok(buf.len())
        }
    }

    fn close(&self) -> sl_writer::Result<()> {
        Err(WriteError::Io(std::io::Error::other("close failed")))
    }
}

#[test]
fn failing_writer_is_isolated_and_reported() {
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let good = Arc::new(IoSink::new(Vec::new()));
    let config = LoggerConfig::default()
        .with_options(FormatOptions::bare())
        .with_writer(FlakySink {
            calls: AtomicUsize::new(0),
        })
        .with_writer(good.clone())
        .with_error_hook(move |failure| {
            assert_eq!(failure.writer_index, 0);
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let logger = Logger::new(config).unwrap();

    for i in 0..10 {
        logger.info(&format!("m{}", i));
    }

    assert_eq!(text(&good).lines().count(), 10);
    assert_eq!(logger.error_count(), 5);
    assert_eq!(failures.load(Ordering::SeqCst), 5);

    // First close error is returned, yet every writer gets closed
    assert!(logger.close().is_err());
    assert!(good.with_inner(|_| ()).is_none());
    logger.close().unwrap();
}

// ============================================================================
// Sanitization through the logger
// ============================================================================

#[test]
fn sensitive_fields_never_reach_json_output() {
    let (sink, logger) = captured(
        LoggerConfig::default()
            .with_format(LogFormat::Json)
            .with_options(FormatOptions::bare())
            .with_security(SecurityConfig::full()),
    );

    logger.warn_with(
        "payment for bob@example.com declined",
        &[
            Field::new("api_key", "sk-live-1234567890abcdef"),
            Field::new("card", "4111 1111 1111 1111"),
            Field::new("request", serde_json::json!({"authorization": "Basic xyz", "path": "/pay"})),
        ],
    );

    let out = text(&sink);
    let entry: Value = serde_json::from_str(out.trim_end()).unwrap();
    assert_eq!(entry["fields"]["api_key"], "[REDACTED]");
    assert_eq!(entry["fields"]["request"]["authorization"], "[REDACTED]");
    assert_eq!(entry["fields"]["request"]["path"], "/pay");
    assert!(!out.contains("bob@example.com"));
    assert!(!out.contains("4111"));
    assert!(!out.contains("sk-live"));
}

#[test]
fn oversized_message_is_capped() {
    let (sink, logger) = captured(
        LoggerConfig::default()
            .with_options(FormatOptions::bare())
            .with_security(SecurityConfig::default().with_max_message_size(32)),
    );
    logger.info(&"z".repeat(10_000));
    assert_eq!(text(&sink), format!("{}...[TRUNCATED]\n", "z".repeat(32)));
}

#[test]
fn capped_secret_keeps_marker() {
    let (sink, logger) = captured(
        LoggerConfig::default()
            .with_options(FormatOptions::bare())
            .with_security(SecurityConfig::basic().with_max_message_size(24)),
    );
    logger.info(&format!("retry password={}", "s3cr3t".repeat(20)));
    assert_eq!(text(&sink), "retry password=[REDACTED]...[TRUNCATED]\n");
}

proptest! {
    #[test]
    fn prop_one_call_one_line(msg in "\\PC{0,40}(\r\n|\n|\r)\\PC{0,40}", value in "\\PC{0,20}\n\\PC{0,20}") {
        let (sink, logger) = captured(LoggerConfig::default());
        logger.error_with(&msg, &[Field::new("note", value)]);
        let out = text(&sink);
        prop_assert_eq!(out.matches('\n').count(), 1);
        prop_assert!(out.ends_with('\n'));
        prop_assert!(!out.contains('\r'));
    }
}

// ============================================================================
// Macros and default logger
// ============================================================================

#[test]
fn macros_respect_level_and_caller() {
    let (sink, logger) = captured(
        LoggerConfig::default()
            .with_level(LogLevel::Info)
            .with_options(FormatOptions::bare().with_caller(true)),
    );

    log_debug!(logger, "skipped {}", 1);
    let line = line!() + 1;
    log_info!(logger, "count={}", 2);

    assert_eq!(
        text(&sink),
        format!("logger_dispatch.rs:{} count=2\n", line)
    );
}

#[test]
fn default_logger_can_be_replaced() {
    let (sink, logger) = captured(LoggerConfig::default().with_options(FormatOptions::bare()));
    let previous = sl_core::set_default(Arc::new(logger));

    sl_core::info("through the default");
    sl_core::info_with("with fields", &[Field::new("k", "v")]);
    sl_core::debug("below default level");

    assert_eq!(text(&sink), "through the default\nwith fields k=v\n");

    let ours = sl_core::set_default(previous);
    assert_eq!(ours.writer_count(), 1);
}
