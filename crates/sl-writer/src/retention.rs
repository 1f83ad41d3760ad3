//! Backup naming, discovery and retention for rotated log files.
//!
//! A backup of `dir/app.log` is named `dir/app_log_<N>.log`, or
//! `dir/app_log_<N>.log.gz` once compressed. The directory listing is the
//! only record of which indices exist, so numbering continues correctly
//! after a restart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::compress::remove_best_effort;
use crate::{Result, WriteError};

const GZ_SUFFIX: &str = ".gz";

/// A rotated backup discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub index: u64,
    pub compressed: bool,
    pub modified: Option<SystemTime>,
}

/// Filename pieces shared by every backup of one active file.
struct BackupName {
    dir: PathBuf,
    prefix: String,
    ext: String,
}

impl BackupName {
    fn of(active: &Path) -> Self {
        let dir = match active.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = active
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = active
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        if ext.is_empty() {
            Self {
                dir,
                prefix: format!("{stem}_"),
                ext,
            }
        } else {
            Self {
                dir,
                prefix: format!("{stem}_{ext}_"),
                ext: format!(".{ext}"),
            }
        }
    }

    fn file_name(&self, index: u64, compressed: bool) -> String {
        let gz = if compressed { GZ_SUFFIX } else { "" };
        format!("{}{}{}{}", self.prefix, index, self.ext, gz)
    }

    /// Parse `name` back into `(index, compressed)` if it is one of ours.
    fn parse(&self, name: &str) -> Option<(u64, bool)> {
        let rest = name.strip_prefix(&self.prefix)?;
        let index = |digits: &str| -> Option<u64> {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()
        };

        // Active files ending in ".gz" are possible, so try both readings
        let compressed = rest
            .strip_suffix(GZ_SUFFIX)
            .and_then(|r| r.strip_suffix(self.ext.as_str()))
            .and_then(index)
            .map(|i| (i, true));
        compressed.or_else(|| {
            rest.strip_suffix(self.ext.as_str())
                .and_then(index)
                .map(|i| (i, false))
        })
    }
}

/// Path of backup number `index` for `active`.
pub fn backup_path(active: &Path, index: u64, compressed: bool) -> PathBuf {
    let name = BackupName::of(active);
    name.dir.join(name.file_name(index, compressed))
}

/// List every backup of `active`, ordered by index (uncompressed first on ties).
pub fn scan_backups(active: &Path) -> Result<Vec<BackupFile>> {
    let name = BackupName::of(active);
    let entries = match fs::read_dir(&name.dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WriteError::file(&name.dir, e)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WriteError::file(&name.dir, e))?;
        let file_name = entry.file_name();
        let Some((index, compressed)) = file_name.to_str().and_then(|n| name.parse(n)) else {
            continue;
        };
        let modified = entry.metadata().and_then(|m| m.modified()).ok();
        backups.push(BackupFile {
            path: entry.path(),
            index,
            compressed,
            modified,
        });
    }

    backups.sort_by_key(|b| (b.index, b.compressed));
    Ok(backups)
}

/// Next free backup index: one past the highest on disk, starting at 1.
pub fn next_backup_index(active: &Path) -> Result<u64> {
    let highest = scan_backups(active)?
        .iter()
        .map(|b| b.index)
        .max()
        .unwrap_or(0);
    Ok(highest + 1)
}

/// Delete the lowest-indexed backups until at most `max_backups` indices remain.
///
/// The plain and compressed copies of one index count as a single backup
/// and are removed together. `max_backups == 0` keeps everything. Returns how
/// many files were removed; a file that cannot be removed is logged and
/// skipped.
pub fn prune_backups(active: &Path, max_backups: usize) -> Result<usize> {
    if max_backups == 0 {
        return Ok(0);
    }

    let backups = scan_backups(active)?;
    let mut indices: Vec<u64> = backups.iter().map(|b| b.index).collect();
    indices.dedup();
    if indices.len() <= max_backups {
        return Ok(0);
    }

    // Sorted scan: every index up to and including this one goes
    let oldest_kept = indices[indices.len() - max_backups];
    let mut removed = 0;
    for backup in backups.iter().take_while(|b| b.index < oldest_kept) {
        if remove_best_effort(&backup.path) {
            debug!(path = %backup.path.display(), index = backup.index, "Pruned backup");
            removed += 1;
        }
    }

    if removed > 0 {
        info!(
            active = %active.display(),
            removed,
            kept = max_backups,
            "Backup count limit enforced"
        );
    }
    Ok(removed)
}

/// Delete backups (and stray temp files) of `active` older than `max_age`.
///
/// Only files carrying this log's backup prefix are considered; the active
/// file itself is never touched. `max_age` of zero disables the check.
pub fn remove_expired(active: &Path, max_age: Duration) -> Result<usize> {
    if max_age.is_zero() {
        return Ok(0);
    }
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return Ok(0);
    };

    let name = BackupName::of(active);
    let entries = match fs::read_dir(&name.dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(WriteError::file(&name.dir, e)),
    };

    let active_name = active.file_name();
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| WriteError::file(&name.dir, e))?;
        let file_name = entry.file_name();
        if Some(file_name.as_os_str()) == active_name {
            continue;
        }
        let is_ours = file_name
            .to_str()
            .is_some_and(|n| n.starts_with(&name.prefix));
        if !is_ours {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let expired = metadata.modified().map(|m| m < cutoff).unwrap_or(false);
        if expired && remove_best_effort(&entry.path()) {
            debug!(path = %entry.path().display(), "Removed expired backup");
            removed += 1;
        }
    }

    if removed > 0 {
        info!(active = %active.display(), removed, "Backup age limit enforced");
    }
    Ok(removed)
}
