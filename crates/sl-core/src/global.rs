//! Process-wide default logger.
//!
//! Built lazily from the environment on first use, writing text to stderr.
//! Replace it with [`set_default`].

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use sl_writer::ConsoleTarget;

use crate::config::LoggerConfig;
use crate::field::Field;
use crate::level::LogLevel;
use crate::logger::Logger;

static DEFAULT_LOGGER: OnceLock<RwLock<Arc<Logger>>> = OnceLock::new();

fn slot() -> &'static RwLock<Arc<Logger>> {
    DEFAULT_LOGGER.get_or_init(|| RwLock::new(Arc::new(build_default())))
}

fn build_default() -> Logger {
    let mut config = LoggerConfig::from_env(None, None);
    let level = config.level;
    if config.console.is_none() {
        config.console = Some(ConsoleTarget::Stderr);
    }
    Logger::new(config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Default logger configuration rejected; using plain stderr");
        Logger::console(level, ConsoleTarget::Stderr)
    })
}

/// The current default logger.
pub fn default_logger() -> Arc<Logger> {
    slot()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Install `logger` as the default and return the one it replaces.
///
/// The previous logger is not closed; callers holding it keep logging to it.
pub fn set_default(logger: Arc<Logger>) -> Arc<Logger> {
    let mut current = slot().write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *current, logger)
}

#[track_caller]
pub fn log(level: LogLevel, message: &str) {
    default_logger().log(level, message);
}

#[track_caller]
pub fn debug(message: &str) {
    default_logger().debug(message);
}

#[track_caller]
pub fn info(message: &str) {
    default_logger().info(message);
}

#[track_caller]
pub fn warn(message: &str) {
    default_logger().warn(message);
}

#[track_caller]
pub fn error(message: &str) {
    default_logger().error(message);
}

#[track_caller]
pub fn debug_with(message: &str, fields: &[Field]) {
    default_logger().debug_with(message, fields);
}

#[track_caller]
pub fn info_with(message: &str, fields: &[Field]) {
    default_logger().info_with(message, fields);
}

#[track_caller]
pub fn warn_with(message: &str, fields: &[Field]) {
    default_logger().warn_with(message, fields);
}

#[track_caller]
pub fn error_with(message: &str, fields: &[Field]) {
    default_logger().error_with(message, fields);
}
