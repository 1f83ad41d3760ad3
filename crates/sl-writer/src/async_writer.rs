//! Non-blocking writer decorator backed by a bounded queue.
//!
//! Producers copy each entry into the queue and return immediately. One
//! background thread drains the queue into the wrapped sink. When the queue
//! is full, new entries are dropped and counted instead of blocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::{Result, Sink, WriteError};

pub const WORKER_THREAD_NAME: &str = "safelog-async";

/// Snapshot of an [`AsyncWriter`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsyncStats {
    /// Entries accepted into the queue.
    pub enqueued: u64,
    /// Entries the worker delivered to the inner sink.
    pub written: u64,
    /// Entries discarded because the queue was full.
    pub dropped: u64,
    /// Entries the inner sink rejected.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Wraps a sink so writes never block on I/O.
pub struct AsyncWriter<S: Sink + 'static> {
    inner: Arc<S>,
    sender: RwLock<Option<Sender<Vec<u8>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl<S: Sink + 'static> AsyncWriter<S> {
    /// Start the worker thread with a queue of `capacity` entries.
    pub fn new(sink: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(WriteError::InvalidConfig(
                "async queue capacity must be greater than zero".to_string(),
            ));
        }

        let inner = Arc::new(sink);
        let counters = Arc::new(Counters::default());
        let (sender, receiver) = bounded(capacity);

        let worker_sink = inner.clone();
        let worker_counters = counters.clone();
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || drain(receiver, worker_sink, worker_counters))?;

        debug!(capacity, "Async writer started");
        Ok(Self {
            inner,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            counters,
            capacity,
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Sender::len)
    }

    pub fn stats(&self) -> AsyncStats {
        AsyncStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

fn drain<S: Sink>(receiver: Receiver<Vec<u8>>, sink: Arc<S>, counters: Arc<Counters>) {
    // Ends once every sender is gone and the queue is empty
    for entry in receiver.iter() {
        match sink.write(&entry) {
            Ok(_) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let failed = counters.failed.fetch_add(1, Ordering::Relaxed);
                if failed == 0 {
                    warn!(error = %e, "Async writer: inner sink rejected entry");
                }
            }
        }
    }
}

impl<S: Sink + 'static> Sink for AsyncWriter<S> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(WriteError::Closed)?;

        match sender.try_send(buf.to_vec()) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                if dropped == 0 {
                    warn!(capacity = self.capacity, "Async writer queue full; dropping entries");
                }
            }
            Err(TrySendError::Disconnected(_)) => return Err(WriteError::Closed),
        }
        Ok(buf.len())
    }

    /// Forwards to the inner sink. Queued entries are only drained by `close`.
    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        // Held for the whole shutdown so a concurrent close waits for the drain
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return Ok(());
        }
        drop(sender);

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!("Async writer worker panicked");
            }
        }

        let stats = self.stats();
        debug!(
            written = stats.written,
            dropped = stats.dropped,
            failed = stats.failed,
            "Async writer closed"
        );
        self.inner.close()
    }
}

impl<S: Sink + 'static> Drop for AsyncWriter<S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
