//! crates/redirect/src/exception.rs
//! Strategies for logging lines that belong to a stack trace.

use std::fmt;
use std::str::FromStr;

use logging::{Logger, Severity};

/// Decides how consecutive stack-trace lines become log records.
///
/// For every completed line exactly one method is called:
/// [`handle_exception_line`](Self::handle_exception_line) when the line was
/// written while a trace was being printed, and
/// [`notify_not_stack_trace`](Self::notify_not_stack_trace) otherwise.
/// [`flush`](Self::flush) is called once at the end of every explicit flush
/// of the stream, independently of lines.
pub trait ExceptionHandlingStrategy: Send {
    /// Handles one line of a stack trace written on behalf of `logger`.
    fn handle_exception_line(&mut self, line: &str, logger: &Logger);

    /// Signals that the current line is ordinary output, ending any trace in
    /// progress.
    fn notify_not_stack_trace(&mut self);

    /// Emits anything held back; the stream was flushed.
    fn flush(&mut self) {}
}

impl<S> ExceptionHandlingStrategy for Box<S>
where
    S: ExceptionHandlingStrategy + ?Sized,
{
    fn handle_exception_line(&mut self, line: &str, logger: &Logger) {
        (**self).handle_exception_line(line, logger);
    }

    fn notify_not_stack_trace(&mut self) {
        (**self).notify_not_stack_trace();
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Logs every trace line as its own record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogPerLine {
    severity: Severity,
}

impl LogPerLine {
    /// Logs trace lines at `severity`.
    #[must_use]
    pub const fn new(severity: Severity) -> Self {
        Self { severity }
    }
}

impl Default for LogPerLine {
    fn default() -> Self {
        Self::new(Severity::Error)
    }
}

impl ExceptionHandlingStrategy for LogPerLine {
    fn handle_exception_line(&mut self, line: &str, logger: &Logger) {
        logger.log(self.severity, line);
    }

    fn notify_not_stack_trace(&mut self) {}
}

/// Collects a whole trace into a single multi-line record.
///
/// The record is emitted when ordinary output follows the trace, when the
/// trace continues under a different logger, when the stream is flushed, or
/// when the strategy is dropped.
#[derive(Debug)]
pub struct LogToSingleRecord {
    severity: Severity,
    pending: Option<(Logger, String)>,
}

impl LogToSingleRecord {
    /// Logs collected traces at `severity`.
    #[must_use]
    pub const fn new(severity: Severity) -> Self {
        Self {
            severity,
            pending: None,
        }
    }

    /// Whether a trace is being collected.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn emit_pending(&mut self) {
        if let Some((logger, text)) = self.pending.take() {
            logger.log(self.severity, &text);
        }
    }
}

impl Default for LogToSingleRecord {
    fn default() -> Self {
        Self::new(Severity::Error)
    }
}

impl ExceptionHandlingStrategy for LogToSingleRecord {
    fn handle_exception_line(&mut self, line: &str, logger: &Logger) {
        if let Some((current, text)) = &mut self.pending {
            if current == logger {
                text.push('\n');
                text.push_str(line);
                return;
            }
        }
        self.emit_pending();
        self.pending = Some((logger.clone(), line.to_owned()));
    }

    fn notify_not_stack_trace(&mut self) {
        self.emit_pending();
    }

    fn flush(&mut self) {
        self.emit_pending();
    }
}

impl Drop for LogToSingleRecord {
    fn drop(&mut self) {
        self.emit_pending();
    }
}

/// Configuration-level choice of [`ExceptionHandlingStrategy`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ExceptionHandling {
    /// [`LogPerLine`].
    #[default]
    PerLine,
    /// [`LogToSingleRecord`].
    SingleRecord,
}

impl ExceptionHandling {
    /// Builds the strategy, logging trace records at `severity`.
    #[must_use]
    pub fn build(self, severity: Severity) -> Box<dyn ExceptionHandlingStrategy> {
        match self {
            Self::PerLine => Box::new(LogPerLine::new(severity)),
            Self::SingleRecord => Box::new(LogToSingleRecord::new(severity)),
        }
    }

    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerLine => "per-line",
            Self::SingleRecord => "single-record",
        }
    }
}

impl fmt::Display for ExceptionHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognised exception handling name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown exception handling '{0}' (expected per-line or single-record)")]
pub struct ParseExceptionHandlingError(pub String);

impl FromStr for ExceptionHandling {
    type Err = ParseExceptionHandlingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-line" | "per_line" | "line" => Ok(Self::PerLine),
            "single-record" | "single_record" | "single" => Ok(Self::SingleRecord),
            _ => Err(ParseExceptionHandlingError(s.to_owned())),
        }
    }
}
