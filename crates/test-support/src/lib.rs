//! Shared test utilities for the stdio-redirect workspace.
//!
//! [`SharedBuffer`] stands in for a real output channel and [`MemorySink`]
//! for a logging backend. Both are cheap to clone and every clone observes
//! the same underlying storage, so a test can hand one copy to the code under
//! test and inspect the other.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use logging::{LogRecord, LoggerSink, Severity};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory writer whose clones share one byte buffer.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every byte written so far.
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.bytes).clone()
    }

    /// Returns the written bytes decoded as UTF-8, replacing invalid sequences.
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&lock(&self.bytes)).into_owned()
    }

    /// Returns how many times `flush` has been called.
    pub fn flush_count(&self) -> usize {
        *lock(&self.flushes)
    }

    /// Discards the written bytes.
    pub fn clear(&self) {
        lock(&self.bytes).clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.bytes).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        *lock(&self.flushes) += 1;
        Ok(())
    }
}

/// Writer that fails every operation, for error propagation tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"))
    }
}

/// Logger sink whose clones share one record list, visible from any thread.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record received so far.
    pub fn records(&self) -> Vec<LogRecord> {
        lock(&self.records).clone()
    }

    /// Returns the records emitted through the logger called `name`.
    pub fn records_for(&self, name: &str) -> Vec<LogRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.logger == name)
            .cloned()
            .collect()
    }

    /// Returns just the messages, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.records)
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    /// Discards every record.
    pub fn clear(&self) {
        lock(&self.records).clear();
    }
}

impl LoggerSink for MemorySink {
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        lock(&self.records).push(LogRecord::new(logger, severity, message));
    }
}
