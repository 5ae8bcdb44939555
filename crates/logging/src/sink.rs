//! crates/logging/src/sink.rs
//! The logger collaborator: a sink that accepts records and named handles onto it.

use std::fmt;
use std::sync::Arc;

use super::levels::Severity;

/// Destination for log records.
///
/// Implementations receive the logger name (the identity of the code that
/// produced the record), a severity, and the message text. Formatting and
/// transport are entirely the sink's concern.
pub trait LoggerSink: Send + Sync {
    /// Records `message` at `severity` on behalf of `logger`.
    fn log(&self, logger: &str, severity: Severity, message: &str);
}

impl<S> LoggerSink for Arc<S>
where
    S: LoggerSink + ?Sized,
{
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        (**self).log(logger, severity, message);
    }
}

/// A named handle onto a [`LoggerSink`].
///
/// Two loggers compare equal when they carry the same name, matching the
/// usual "one logger per name" semantics of logging facades.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    sink: Arc<dyn LoggerSink>,
}

impl Logger {
    /// Creates a logger called `name` that records into `sink`.
    pub fn new(name: impl Into<Arc<str>>, sink: Arc<dyn LoggerSink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    /// Returns the logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records `message` at `severity`.
    pub fn log(&self, severity: Severity, message: &str) {
        self.sink.log(&self.name, severity, message);
    }

    /// Records `message` at [`Severity::Warn`].
    pub fn warn(&self, message: &str) {
        self.log(Severity::Warn, message);
    }

    /// Records `message` at [`Severity::Error`].
    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

impl PartialEq for Logger {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Logger {}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}
