//! Size-based rotating file writer.
//!
//! The active file is rotated before a write that would push it past the
//! configured size. Rotation renames it to the next free backup index,
//! reopens a fresh active file, then applies compression and retention.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::compress::{compress_file, retry_io, RETRY_ATTEMPTS};
use crate::retention::{backup_path, next_backup_index, prune_backups, remove_expired};
use crate::{Result, Sink, WriteError};

pub const MEGABYTE: u64 = 1024 * 1024;

/// Rotation and retention policy for one log file.
///
/// A zero value disables the corresponding limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriterConfig {
    /// Rotate once the active file would exceed this many MiB.
    pub max_size_mb: u64,
    /// Keep at most this many backups.
    pub max_backups: usize,
    /// Delete backups older than this.
    pub max_age: Duration,
    /// Gzip backups after rotation.
    pub compress: bool,
}

impl Default for FileWriterConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_backups: 10,
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
            compress: false,
        }
    }
}

impl FileWriterConfig {
    /// No rotation and no cleanup.
    pub fn unlimited() -> Self {
        Self {
            max_size_mb: 0,
            max_backups: 0,
            max_age: Duration::ZERO,
            compress: false,
        }
    }

    pub fn with_max_size_mb(mut self, mb: u64) -> Self {
        self.max_size_mb = mb;
        self
    }

    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(MEGABYTE)
    }
}

/// Whether a write of `incoming` bytes onto a file of `current` bytes must
/// rotate first. An empty file is never rotated, so a single oversized
/// entry still lands somewhere.
pub fn needs_rotation(current: u64, incoming: u64, max_bytes: u64) -> bool {
    max_bytes > 0 && current > 0 && current.saturating_add(incoming) > max_bytes
}

/// Open `path` for writing, creating it owner-only (0600 on Unix).
///
/// On Unix a symbolic link at `path` is refused by the open itself, so a
/// link planted after [`validate_path`] ran cannot redirect the writes.
pub(crate) fn open_private(path: &Path, append: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600).custom_flags(libc::O_NOFOLLOW);
    }
    options.open(path)
}

/// Open the active log file for appending.
fn open_active(path: &Path) -> Result<File> {
    open_private(path, true).map_err(|e| {
        #[cfg(unix)]
        if e.raw_os_error() == Some(libc::ELOOP) {
            return WriteError::Symlink(path.to_path_buf());
        }
        WriteError::file(path, e)
    })
}

fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(WriteError::InvalidPath("log file path is empty".to_string()));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(WriteError::InvalidPath(format!(
            "log file path must not contain '..': {}",
            path.display()
        )));
    }
    if path.file_name().is_none() {
        return Err(WriteError::InvalidPath(format!(
            "log file path has no file name: {}",
            path.display()
        )));
    }
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(WriteError::Symlink(path.to_path_buf())),
        Ok(meta) if meta.is_dir() => Err(WriteError::InvalidPath(format!(
            "log file path is a directory: {}",
            path.display()
        ))),
        _ => Ok(()),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.exists() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(parent)
        .map_err(|e| WriteError::file(parent, e))?;
    debug!(dir = %parent.display(), "Created log directory");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| WriteError::file(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

struct FileState {
    file: Option<File>,
    size: u64,
    closed: bool,
}

/// A file sink that rotates by size and cleans up old backups.
///
/// All handle mutation (write, rotate, close) happens under one mutex.
/// Compression and retention run after the lock is released.
pub struct RotatingFileWriter {
    path: PathBuf,
    config: FileWriterConfig,
    state: Mutex<FileState>,
}

impl std::fmt::Debug for RotatingFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileWriter")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RotatingFileWriter {
    /// Open (or create) the active log file at `path`.
    pub fn open(path: impl Into<PathBuf>, config: FileWriterConfig) -> Result<Self> {
        let path = path.into();
        validate_path(&path)?;
        ensure_parent_dir(&path)?;

        let file = open_active(&path)?;
        restrict_permissions(&path)?;
        let size = file
            .metadata()
            .map_err(|e| WriteError::file(&path, e))?
            .len();

        debug!(path = %path.display(), size, "Opened log file");
        Ok(Self {
            path,
            config,
            state: Mutex::new(FileState {
                file: Some(file),
                size,
                closed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &FileWriterConfig {
        &self.config
    }

    /// Bytes in the active file as tracked by this writer.
    pub fn size(&self) -> u64 {
        self.lock().size
    }

    /// Rotate now, regardless of size. Returns the backup's final path
    /// (ending in `.gz` when compression succeeded).
    pub fn rotate(&self) -> Result<PathBuf> {
        let backup = {
            let mut state = self.lock();
            if state.closed {
                return Err(WriteError::Closed);
            }
            self.roll(&mut state)?
        };
        self.after_roll(backup)
    }

    /// Apply the backup count and age limits without rotating.
    pub fn cleanup(&self) -> Result<usize> {
        let pruned = prune_backups(&self.path, self.config.max_backups)?;
        let expired = remove_expired(&self.path, self.config.max_age)?;
        Ok(pruned + expired)
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reopen(&self, state: &mut FileState) -> Result<()> {
        let file = open_active(&self.path)?;
        state.size = file
            .metadata()
            .map_err(|e| WriteError::file(&self.path, e))?
            .len();
        state.file = Some(file);
        Ok(())
    }

    /// Rename the active file to the next backup index and open a fresh one.
    fn roll(&self, state: &mut FileState) -> Result<PathBuf> {
        let index = next_backup_index(&self.path)?;
        let backup = backup_path(&self.path, index, false);

        if let Some(file) = state.file.as_ref() {
            file.sync_all().map_err(|e| WriteError::file(&self.path, e))?;
        }
        // Release the handle before renaming; required on Windows
        state.file = None;

        if let Err(e) = retry_io(RETRY_ATTEMPTS, || fs::rename(&self.path, &backup)) {
            self.reopen(state)?;
            return Err(WriteError::file(&self.path, e));
        }

        let file = open_active(&self.path)?;
        state.file = Some(file);
        state.size = 0;

        info!(
            path = %self.path.display(),
            backup = %backup.display(),
            index,
            "Rotated log file"
        );
        Ok(backup)
    }

    /// Compress and enforce retention after a roll. Every step runs; the
    /// first failure is returned.
    fn after_roll(&self, backup: PathBuf) -> Result<PathBuf> {
        let mut first_err = None;
        let mut final_path = backup;

        if self.config.compress {
            match compress_file(&final_path) {
                Ok(gz) => final_path = gz,
                Err(e) => {
                    warn!(backup = %final_path.display(), error = %e, "Backup compression failed; keeping uncompressed copy");
                    first_err = Some(e);
                }
            }
        }

        if let Err(e) = prune_backups(&self.path, self.config.max_backups) {
            warn!(path = %self.path.display(), error = %e, "Backup pruning failed");
            first_err.get_or_insert(e);
        }
        if let Err(e) = remove_expired(&self.path, self.config.max_age) {
            warn!(path = %self.path.display(), error = %e, "Expired backup cleanup failed");
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(final_path),
        }
    }
}

impl Sink for RotatingFileWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let incoming = buf.len() as u64;
        let max_bytes = self.config.max_size_bytes();

        let rolled = {
            let mut state = self.lock();
            if state.closed {
                return Err(WriteError::Closed);
            }
            if state.file.is_none() {
                self.reopen(&mut state)?;
            }

            let rolled = if needs_rotation(state.size, incoming, max_bytes) {
                Some(self.roll(&mut state)?)
            } else {
                None
            };

            let file = state.file.as_mut().ok_or(WriteError::Closed)?;
            file.write_all(buf)
                .map_err(|e| WriteError::file(&self.path, e))?;
            state.size += incoming;
            rolled
        };

        if let Some(backup) = rolled {
            self.after_roll(backup)?;
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.lock();
        if let Some(file) = state.file.as_mut() {
            file.flush().map_err(|e| WriteError::file(&self.path, e))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        match state.file.take() {
            Some(file) => file.sync_all().map_err(|e| WriteError::file(&self.path, e)),
            None => Ok(()),
        }
    }
}
