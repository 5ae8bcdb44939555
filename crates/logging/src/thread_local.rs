//! crates/logging/src/thread_local.rs
//! Thread-local record capture used by tests and the tracing capture layer.

use super::levels::Severity;
use super::sink::LoggerSink;
use std::cell::RefCell;

thread_local! {
    #[allow(clippy::missing_const_for_thread_local)]
    static RECORDS: RefCell<Vec<LogRecord>> = RefCell::new(Vec::new());
}

/// A log record as seen by a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Name of the logger the record was emitted through.
    pub logger: String,
    /// Record severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

impl LogRecord {
    /// Builds a record.
    pub fn new(logger: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
            severity,
            message: message.into(),
        }
    }
}

/// Append a record to the current thread's buffer.
pub fn emit(record: LogRecord) {
    RECORDS.with(|r| r.borrow_mut().push(record));
}

/// Drain all collected records, clearing the internal buffer.
pub fn drain_records() -> Vec<LogRecord> {
    RECORDS.with(|r| r.borrow_mut().drain(..).collect())
}

/// Sink that stores every record in the calling thread's buffer.
///
/// Redirection dispatches synchronously on the writing thread, so a test can
/// write, flush, and then inspect [`drain_records`] without any shared state.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapturingSink;

impl LoggerSink for CapturingSink {
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        emit(LogRecord::new(logger, severity, message));
    }
}
