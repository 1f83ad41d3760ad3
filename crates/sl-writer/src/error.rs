//! Errors from sink operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Errors from sink operations.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Refusing to open symbolic link: {0}")]
    Symlink(PathBuf),

    #[error("Compression of {path} failed: {source}")]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Writer closed")]
    Closed,
}

impl WriteError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WriteError::File {
            path: path.into(),
            source,
        }
    }
}
