//! The byte sink abstraction every safelog destination implements.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Result, WriteError};

/// A destination for rendered log lines.
///
/// Implementations serialize their own writes, so a sink may be shared
/// across threads without external locking. `write` either persists the
/// whole buffer (returning its length) or fails.
pub trait Sink: Send + Sync {
    /// Write one rendered entry.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Push any buffered bytes to the next layer.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Release the destination. Later writes fail with [`WriteError::Closed`].
    fn close(&self) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Which standard stream a console sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Writes to the process stdout or stderr.
///
/// Each write holds the std handle lock, so lines from concurrent callers
/// never interleave. Closing flushes the stream but leaves it open for the
/// rest of the process.
#[derive(Debug)]
pub struct ConsoleSink {
    target: ConsoleTarget,
    closed: AtomicBool,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            target,
            closed: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new(ConsoleTarget::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(ConsoleTarget::Stderr)
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl Sink for ConsoleSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WriteError::Closed);
        }
        match self.target {
            ConsoleTarget::Stdout => io::stdout().lock().write_all(buf)?,
            ConsoleTarget::Stderr => io::stderr().lock().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush()?,
            ConsoleTarget::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush()
    }
}

/// Adapts any [`io::Write`] into a [`Sink`] behind a mutex.
///
/// Use this for custom destinations (sockets, pipes, in-memory buffers).
#[derive(Debug)]
pub struct IoSink<W: Write + Send> {
    inner: Mutex<Option<W>>,
}

impl<W: Write + Send> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Run `f` against the inner writer, if it has not been closed.
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut W) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    /// Take the inner writer back, closing the sink.
    pub fn into_inner(self) -> Option<W> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Option<W>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Sink for IoSink<W> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut guard = self.lock();
        let writer = guard.as_mut().ok_or(WriteError::Closed)?;
        writer.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        match self.lock().take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}
