//! Errors raised while building or running a logger.

use thiserror::Error;

use sl_filter::FilterError;
use sl_writer::WriteError;

use crate::format::FormatError;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Too many writers: {count} configured, limit is {max}")]
    TooManyWriters { count: usize, max: usize },

    #[error("No writers configured")]
    NoWriters,

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriteError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),
}
