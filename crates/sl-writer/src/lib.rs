//! Log destinations for safelog.
//!
//! This crate provides:
//! - The [`Sink`] trait and console / `io::Write` adapters
//! - A size-rotating file writer with gzip backups and retention limits
//! - [`AsyncWriter`], a bounded-queue decorator that never blocks the caller
//! - [`BufferedWriter`], a write-combining decorator
//!
//! Decorators are sinks themselves and compose freely:
//!
//! ```no_run
//! use sl_writer::{AsyncWriter, BufferedWriter, FileWriterConfig, RotatingFileWriter, Sink};
//!
//! let file = RotatingFileWriter::open("/var/log/app/app.log", FileWriterConfig::default())?;
//! let writer = AsyncWriter::new(BufferedWriter::new(file, 0), 4096)?;
//! writer.write(b"started\n")?;
//! writer.close()?;
//! # Ok::<(), sl_writer::WriteError>(())
//! ```

pub mod async_writer;
pub mod buffered;
pub mod compress;
pub mod error;
pub mod retention;
pub mod rotating;
pub mod sink;

pub use async_writer::{AsyncStats, AsyncWriter, WORKER_THREAD_NAME};
pub use buffered::{BufferedWriter, DEFAULT_BUFFER_SIZE};
pub use compress::{compress_file, gz_path, retry_io, verify_gzip, RETRY_ATTEMPTS, RETRY_DELAY};
pub use error::{Result, WriteError};
pub use retention::{
    backup_path, next_backup_index, prune_backups, remove_expired, scan_backups, BackupFile,
};
pub use rotating::{needs_rotation, FileWriterConfig, RotatingFileWriter, MEGABYTE};
pub use sink::{ConsoleSink, ConsoleTarget, IoSink, Sink};

/// Default queue capacity for [`AsyncWriter`] when none is configured.
pub const DEFAULT_ASYNC_CAPACITY: usize = 1000;
