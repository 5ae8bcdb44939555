//! crates/redirect/src/stream.rs
//! The intercepting stream installed in place of a real output channel.
//!
//! Writes are buffered until [`InterceptingStream::flush`], which drains every
//! line and routes it one of three ways:
//!
//! 1. Lines written by a registered logging system are written verbatim to
//!    the original channel. A one-time advisory is logged the first time this
//!    happens.
//! 2. Lines written while a stack trace is printed go to the
//!    [`ExceptionHandlingStrategy`].
//! 3. Everything else becomes a log record under the caller's module path.
//!
//! The call origin of a line is taken when the write that starts the line
//! arrives, so a flush issued from elsewhere does not change attribution.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use logging::{Logger, Severity};

use crate::call_origin::CallOrigin;
use crate::channel::{Channel, RawHandle};
use crate::config::RedirectConfig;
use crate::context::RedirectContext;
use crate::exception::ExceptionHandlingStrategy;
use crate::line_buffer::{Line, LineBuffer};

/// Message of the advisory logged the first time logging-system output is
/// passed through.
pub const PERFORMANCE_ADVISORY: &str = "A logging system is writing to a redirected output \
channel. Its output is passed through unlogged, but every line costs a call-stack inspection; \
configure it to write to the original channel instead.";

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is dispatching a line.
///
/// Anything the thread writes to an intercepted channel in that window (a
/// console subscriber printing the record just produced, an appender hook)
/// goes straight to the original channel.
#[must_use]
pub fn is_dispatching() -> bool {
    DISPATCHING.with(Cell::get)
}

/// Marks the current thread as dispatching until dropped.
struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    fn enter() -> Self {
        Self {
            previous: DISPATCHING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(self.previous));
    }
}

/// A line about to be logged, as seen by an [`AppenderHook`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineEvent<'a> {
    /// Channel the line was written to.
    pub channel: Channel,
    /// Name of the logger the record goes to.
    pub logger: &'a str,
    /// Severity of the record.
    pub severity: Severity,
    /// Line text without its terminator.
    pub message: &'a str,
    /// Whether the line is part of a stack trace.
    pub stack_trace: bool,
}

/// Receives every line an intercepting stream is about to log.
///
/// Logging-system output is not reported: it is never logged. The hook runs
/// while the stream holds its line state, so it may replace or remove hooks
/// and write to any channel, but must not call
/// [`InterceptingStream::buffered_len`] on its own stream.
pub trait AppenderHook: Send + Sync {
    /// Called before the line is handed to the logger or trace strategy.
    fn append(&self, event: &LineEvent<'_>);
}

impl<F> AppenderHook for F
where
    F: Fn(&LineEvent<'_>) + Send + Sync,
{
    fn append(&self, event: &LineEvent<'_>) {
        self(event);
    }
}

type HookSlot = Option<Arc<dyn AppenderHook>>;

struct StreamState {
    buffer: LineBuffer,
    origins: VecDeque<CallOrigin>,
    strategy: Box<dyn ExceptionHandlingStrategy>,
}

/// Stand-in for an output channel that turns completed lines into log
/// records.
pub struct InterceptingStream {
    channel: Channel,
    original: RawHandle,
    context: Arc<RedirectContext>,
    severity: Severity,
    exception_severity: Severity,
    suspended: AtomicBool,
    appender: RwLock<HookSlot>,
    state: Mutex<StreamState>,
}

impl InterceptingStream {
    /// Creates a stream for `channel` wrapping `original`.
    ///
    /// Ordinary lines are logged at `severity`; trace lines go to
    /// `strategy`, whose records are reported to appender hooks at
    /// `exception_severity`.
    pub fn new(
        channel: Channel,
        original: RawHandle,
        context: Arc<RedirectContext>,
        severity: Severity,
        strategy: Box<dyn ExceptionHandlingStrategy>,
        exception_severity: Severity,
    ) -> Self {
        Self {
            channel,
            original,
            context,
            severity,
            exception_severity,
            suspended: AtomicBool::new(false),
            appender: RwLock::new(None),
            state: Mutex::new(StreamState {
                buffer: LineBuffer::new(),
                origins: VecDeque::new(),
                strategy,
            }),
        }
    }

    /// Creates a stream configured from `config`.
    #[must_use]
    pub fn from_config(
        channel: Channel,
        original: RawHandle,
        context: Arc<RedirectContext>,
        config: &RedirectConfig,
    ) -> Self {
        Self::new(
            channel,
            original,
            context,
            config.severity_for(channel),
            config.exceptions.build(config.exception_severity),
            config.exception_severity,
        )
    }

    /// Channel this stream stands in for.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// The handle that was active before interception.
    #[must_use]
    pub const fn original(&self) -> &RawHandle {
        &self.original
    }

    /// The shared redirection context.
    #[must_use]
    pub const fn context(&self) -> &Arc<RedirectContext> {
        &self.context
    }

    /// Severity of ordinary lines.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Number of bytes waiting for a flush.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.lock_state().buffer.len()
    }

    /// Buffers `bytes`.
    ///
    /// While the stream is suspended, or when called from inside a dispatch
    /// on this thread, the bytes are written to the original channel instead.
    ///
    /// # Errors
    ///
    /// Propagates failures of the original channel on the pass-through paths.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if is_dispatching() || self.is_suspended() {
            return self.original.write_all(bytes);
        }

        let mut state = self.lock_state();
        let opened = lines_opened(state.buffer.at_line_start(), bytes);
        if opened > 0 {
            let origin = self.context.call_origin();
            state.origins.extend(std::iter::repeat_n(origin, opened));
        }
        state.buffer.append(bytes);
        Ok(())
    }

    /// Drains and dispatches every buffered line, including a partial tail,
    /// then lets the trace strategy emit whatever it is still holding.
    ///
    /// # Errors
    ///
    /// Propagates failures of the original channel. Lines after the failing
    /// one are dropped from the buffer.
    pub fn flush(&self) -> io::Result<()> {
        if is_dispatching() {
            return self.original.flush();
        }
        self.drain(LineBuffer::drain_all, true)
    }

    /// Dispatches every complete line, keeping a partial tail buffered.
    ///
    /// # Errors
    ///
    /// As for [`flush`](Self::flush).
    pub fn flush_complete_lines(&self) -> io::Result<()> {
        if is_dispatching() {
            return Ok(());
        }
        self.drain(LineBuffer::drain_complete_lines, false)
    }

    fn drain(&self, take: fn(&mut LineBuffer) -> Vec<Line>, finish: bool) -> io::Result<()> {
        let mut state = self.lock_state();
        let lines = take(&mut state.buffer);
        let taken = lines.len().min(state.origins.len());
        let origins = state.origins.drain(..taken).collect::<Vec<_>>();

        let _guard = DispatchGuard::enter();
        let dispatched = self.dispatch_all(&mut state, &lines, origins);
        if finish {
            state.strategy.flush();
        }
        dispatched
    }

    fn dispatch_all(
        &self,
        state: &mut StreamState,
        lines: &[Line],
        origins: Vec<CallOrigin>,
    ) -> io::Result<()> {
        let mut origins = origins.into_iter();
        let mut passed_through = false;
        for line in lines {
            let origin = origins.next().unwrap_or_else(|| self.context.call_origin());
            passed_through |= self.dispatch(state, line, &origin)?;
        }
        if passed_through {
            self.original.flush()?;
        }
        Ok(())
    }

    /// Routes one line. Returns whether it was written to the original
    /// channel.
    fn dispatch(
        &self,
        state: &mut StreamState,
        line: &Line,
        origin: &CallOrigin,
    ) -> io::Result<bool> {
        if origin.is_in_logging_system() {
            state.strategy.notify_not_stack_trace();
            self.original.write_all(line.raw())?;
            if self.context.claim_warning() {
                self.context.logger(module_path!()).warn(PERFORMANCE_ADVISORY);
            }
            return Ok(true);
        }

        let text = line.text();
        let logger = self.context.logger(origin.caller());
        if origin.is_printing_stack_trace() {
            self.notify_appender(&logger, self.exception_severity, &text, true);
            state.strategy.handle_exception_line(&text, &logger);
        } else {
            state.strategy.notify_not_stack_trace();
            self.notify_appender(&logger, self.severity, &text, false);
            logger.log(self.severity, &text);
        }
        Ok(false)
    }

    fn notify_appender(
        &self,
        logger: &Logger,
        severity: Severity,
        message: &str,
        stack_trace: bool,
    ) {
        let appender = self.appender_slot().clone();
        if let Some(appender) = appender {
            appender.append(&LineEvent {
                channel: self.channel,
                logger: logger.name(),
                severity,
                message,
                stack_trace,
            });
        }
    }

    /// Sends subsequent writes straight to the original channel, after
    /// dispatching whatever is already buffered.
    ///
    /// # Errors
    ///
    /// Propagates failures from flushing the buffered lines.
    pub fn suspend(&self) -> io::Result<()> {
        if !self.suspended.swap(true, Ordering::AcqRel) {
            tracing::debug!(channel = %self.channel, "suspended redirection");
        }
        self.flush()
    }

    /// Resumes logging of subsequent writes.
    pub fn resume(&self) {
        if self.suspended.swap(false, Ordering::AcqRel) {
            tracing::debug!(channel = %self.channel, "resumed redirection");
        }
    }

    /// Whether writes currently bypass the logger.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Installs `hook`, replacing any previous one.
    pub fn set_appender(&self, hook: Arc<dyn AppenderHook>) {
        *self.appender_slot_mut() = Some(hook);
    }

    /// Removes the appender hook, if any.
    pub fn clear_appender(&self) {
        *self.appender_slot_mut() = None;
    }

    /// Whether an appender hook is installed.
    #[must_use]
    pub fn has_appender(&self) -> bool {
        self.appender_slot().is_some()
    }

    /// Poisoning is ignored: lines are out of the buffer before dispatch.
    fn lock_state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn appender_slot(&self) -> RwLockReadGuard<'_, HookSlot> {
        self.appender.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn appender_slot_mut(&self) -> RwLockWriteGuard<'_, HookSlot> {
        self.appender.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InterceptingStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptingStream")
            .field("channel", &self.channel)
            .field("original", &self.original)
            .field("suspended", &self.is_suspended())
            .finish_non_exhaustive()
    }
}

/// Number of lines whose first byte is in `bytes`.
fn lines_opened(at_line_start: bool, bytes: &[u8]) -> usize {
    let inner_starts = memchr::memchr_iter(b'\n', bytes)
        .filter(|&i| i + 1 < bytes.len())
        .count();
    inner_starts + usize::from(at_line_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_opened_counts_line_starts() {
        assert_eq!(lines_opened(true, b"a"), 1);
        assert_eq!(lines_opened(false, b"a"), 0);
        assert_eq!(lines_opened(false, b"a\n"), 0);
        assert_eq!(lines_opened(false, b"a\nb"), 1);
        assert_eq!(lines_opened(true, b"a\nb\n"), 2);
        assert_eq!(lines_opened(true, b"\n\n\n"), 3);
    }

    #[test]
    fn dispatch_guard_nests_and_restores() {
        assert!(!is_dispatching());
        {
            let _outer = DispatchGuard::enter();
            assert!(is_dispatching());
            {
                let _inner = DispatchGuard::enter();
                assert!(is_dispatching());
            }
            assert!(is_dispatching());
        }
        assert!(!is_dispatching());
    }

    #[test]
    fn dispatch_flag_is_per_thread() {
        let _guard = DispatchGuard::enter();
        let other = std::thread::spawn(is_dispatching).join().unwrap();
        assert!(!other);
    }
}
