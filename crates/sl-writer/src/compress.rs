//! Gzip compression of rotated backups.
//!
//! A backup is compressed into `<backup>.gz.tmp`, the temp file is checked
//! by decoding its first block, and only then renamed over `<backup>.gz`.
//! Any failure before the rename leaves the uncompressed backup untouched.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::rotating::open_private;
use crate::{Result, WriteError};

/// Attempts made by [`retry_io`].
pub const RETRY_ATTEMPTS: u32 = 3;

/// Pause between [`retry_io`] attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Smallest possible gzip member: 10 byte header plus 8 byte trailer.
const MIN_GZIP_LEN: u64 = 18;

/// Decoded bytes read back when checking a fresh archive.
const VERIFY_BLOCK: u64 = 8192;

/// Path of the compressed form of `path`.
pub fn gz_path(path: &Path) -> PathBuf {
    with_suffix(path, ".gz")
}

fn tmp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".gz.tmp")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Run `op` up to `attempts` times, sleeping [`RETRY_DELAY`] in between.
///
/// Tolerates short-lived lock contention on rename/remove (virus scanners,
/// log shippers holding the file open).
pub fn retry_io<T>(attempts: u32, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            thread::sleep(RETRY_DELAY);
        }
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("retry_io: no attempts made")))
}

/// Remove `path`, retrying on failure. A missing file counts as removed.
pub(crate) fn remove_with_retry(path: &Path) -> io::Result<()> {
    retry_io(RETRY_ATTEMPTS, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
}

/// Best-effort removal on a cleanup path; gives up with a warning.
pub(crate) fn remove_best_effort(path: &Path) -> bool {
    match remove_with_retry(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file after retries");
            false
        }
    }
}

/// Compress `src` to `src.gz` and remove `src`.
///
/// Returns the path of the compressed file. On error the temp file is
/// discarded and `src` is left in place.
pub fn compress_file(src: &Path) -> Result<PathBuf> {
    let dst = gz_path(src);
    let tmp = tmp_path(src);

    if let Err(e) = write_gzip(src, &tmp).and_then(|()| verify_gzip(&tmp)) {
        let _ = fs::remove_file(&tmp);
        return Err(WriteError::Compression {
            path: src.to_path_buf(),
            source: e,
        });
    }

    if dst.exists() {
        if let Err(e) = remove_with_retry(&dst) {
            warn!(path = %dst.display(), error = %e, "Could not remove existing compressed backup");
        }
    }

    if let Err(e) = retry_io(RETRY_ATTEMPTS, || fs::rename(&tmp, &dst)) {
        let _ = fs::remove_file(&tmp);
        return Err(WriteError::Compression {
            path: src.to_path_buf(),
            source: e,
        });
    }

    remove_best_effort(src);
    debug!(path = %dst.display(), "Compressed backup");
    Ok(dst)
}

fn write_gzip(src: &Path, tmp: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(src)?);
    let output = open_private(tmp, false)?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;

    let file = encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Check that `path` holds a readable gzip stream by decoding its first block.
pub fn verify_gzip(path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    if file.metadata()?.len() < MIN_GZIP_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "gzip stream shorter than header and trailer",
        ));
    }

    let mut first_block = GzDecoder::new(file).take(VERIFY_BLOCK);
    io::copy(&mut first_block, &mut io::sink())?;
    Ok(())
}
