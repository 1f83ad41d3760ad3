//! Write-combining decorator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::{Result, Sink, WriteError};

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

struct BufState {
    buf: Vec<u8>,
    closed: bool,
}

/// Accumulates small writes and hands them to the inner sink in one call.
///
/// A write that would overflow the buffer flushes it first. Entries at
/// least as large as the buffer go straight through.
pub struct BufferedWriter<S: Sink> {
    inner: S,
    capacity: usize,
    state: Mutex<BufState>,
}

impl<S: Sink> BufferedWriter<S> {
    /// Buffer up to `size` bytes; zero selects [`DEFAULT_BUFFER_SIZE`].
    pub fn new(sink: S, size: usize) -> Self {
        let capacity = if size == 0 { DEFAULT_BUFFER_SIZE } else { size };
        Self {
            inner: sink,
            capacity,
            state: Mutex::new(BufState {
                buf: Vec::with_capacity(capacity),
                closed: false,
            }),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held but not yet written.
    pub fn pending(&self) -> usize {
        self.lock().buf.len()
    }

    fn lock(&self) -> MutexGuard<'_, BufState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush_buffer(&self, state: &mut BufState) -> Result<()> {
        if state.buf.is_empty() {
            return Ok(());
        }
        // Cleared even on failure so one bad write cannot grow the buffer forever
        let result = self.inner.write(&state.buf).map(|_| ());
        state.buf.clear();
        result
    }
}

impl<S: Sink> Sink for BufferedWriter<S> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(WriteError::Closed);
        }

        if state.buf.len() + buf.len() > self.capacity {
            self.flush_buffer(&mut state)?;
        }
        if buf.len() >= self.capacity {
            self.inner.write(buf)?;
        } else {
            state.buf.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.lock();
        self.flush_buffer(&mut state)?;
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        let flushed = self.flush_buffer(&mut state);
        let closed = self.inner.close();
        flushed.and(closed)
    }
}

impl<S: Sink> Drop for BufferedWriter<S> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.closed || state.buf.is_empty() {
            return;
        }
        if let Err(e) = self.inner.write(&state.buf) {
            warn!(error = %e, bytes = state.buf.len(), "Failed to flush buffered log data on drop");
        }
        state.buf.clear();
    }
}
