#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `stdio-redirect` sends everything a program prints to standard output and
//! standard error into `tracing`, attributing each line to the module that
//! printed it. Output produced by a logging backend is recognised and passed
//! through to the terminal unlogged, so a console subscriber keeps working
//! while redirection is active.
//!
//! The process-wide registry is created on first use. It wraps the real
//! `stdout` and `stderr`, logs through [`logging::TracingSink`], classifies
//! writes by walking the call stack, and starts with the common Rust logging
//! backends registered as logging systems. Settings come from the
//! `STDIO_REDIRECT` environment variable (see [`RedirectConfig`]).
//!
//! Rust cannot replace the standard streams in place, so output meant for
//! redirection is written through [`stdout()`] and [`stderr()`]. A
//! [`install_panic_hook`] call routes panic reports the same way.
//!
//! # Examples
//!
//! ```no_run
//! use std::io::Write;
//!
//! logging::init_tracing(stdio_redirect::original_stderr).unwrap();
//! stdio_redirect::send_output_to_logs();
//!
//! writeln!(stdio_redirect::stdout(), "becomes an INFO event").unwrap();
//! writeln!(stdio_redirect::stderr(), "becomes a WARN event").unwrap();
//!
//! stdio_redirect::restore_original_outputs().unwrap();
//! ```

use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

pub use logging::Severity;
pub use redirect::{
    AppenderHook, CONFIG_ENV, Channel, ChannelWriter, ConfigError, ExceptionHandling, LineEvent,
    OutputChannels, RedirectConfig,
};
use redirect::{RawHandle, RedirectContext, StackWalker};

static CHANNELS: OnceLock<Arc<OutputChannels>> = OnceLock::new();

/// The process-wide channel registry, created on first use.
pub fn channels() -> &'static Arc<OutputChannels> {
    let mut rejected = None;
    let channels = CHANNELS.get_or_init(|| {
        let config = RedirectConfig::from_env().unwrap_or_else(|err| {
            rejected = Some(err);
            RedirectConfig::default()
        });
        let origins = StackWalker::new().with_internal_prefix(env!("CARGO_CRATE_NAME"));
        let context = RedirectContext::builder()
            .call_origin_source(Arc::new(origins))
            .known_logging_systems()
            .build();
        Arc::new(OutputChannels::standard(Arc::new(context), config))
    });
    if let Some(err) = rejected {
        tracing::warn!(%err, "ignoring {CONFIG_ENV}");
    }
    channels
}

/// Redirects both channels using the configuration already in effect.
/// Has no effect on a channel that is already redirected.
pub fn send_output_to_logs() {
    for channel in Channel::ALL {
        channels().install(channel);
    }
}

/// Applies `config` and redirects both channels.
///
/// A channel that is already redirected keeps its settings until it is
/// restored and redirected again.
pub fn send_output_to_logs_with(config: RedirectConfig) {
    channels().set_config(config);
    send_output_to_logs();
}

/// Passes output straight through without uninstalling redirection.
/// Lines already buffered are logged first.
///
/// # Errors
///
/// Propagates failures from flushing buffered lines.
pub fn stop_sending_output_to_logs() -> io::Result<()> {
    for channel in Channel::ALL {
        channels().suspend(channel)?;
    }
    Ok(())
}

/// Undoes [`stop_sending_output_to_logs`].
pub fn resume_sending_output_to_logs() {
    for channel in Channel::ALL {
        channels().resume(channel);
    }
}

/// Whether either channel is currently logging its output.
pub fn is_sending_output_to_logs() -> bool {
    Channel::ALL.into_iter().any(|channel| {
        channels()
            .intercepting_stream(channel)
            .is_some_and(|stream| !stream.is_suspended())
    })
}

/// Puts the real `stdout` and `stderr` back, logging any partial line
/// left in the removed streams.
///
/// # Errors
///
/// Propagates failures from flushing the removed streams.
pub fn restore_original_outputs() -> io::Result<()> {
    for channel in Channel::ALL {
        if let Some(stream) = channels().restore(channel) {
            stream.flush()?;
        }
    }
    Ok(())
}

/// Declares that code under the module path `prefix` is part of a logging
/// system, so its output is passed through rather than logged.
pub fn register_logging_system(prefix: &str) {
    channels().context().registry().register(prefix);
}

/// Whether exactly `prefix` has been registered as a logging system.
pub fn is_logging_system_registered(prefix: &str) -> bool {
    channels().context().registry().is_registered(prefix)
}

/// Writer onto standard output, redirected while redirection is active.
pub fn stdout() -> ChannelWriter {
    channels().writer(Channel::Primary)
}

/// Writer onto standard error, redirected while redirection is active.
pub fn stderr() -> ChannelWriter {
    channels().writer(Channel::Error)
}

/// The real standard output, bypassing redirection. Suitable as a
/// `MakeWriter` for a console subscriber.
pub fn original_stdout() -> impl Write {
    OriginalWriter(channels().original_handle(Channel::Primary))
}

/// The real standard error, bypassing redirection.
pub fn original_stderr() -> impl Write {
    OriginalWriter(channels().original_handle(Channel::Error))
}

struct OriginalWriter(RawHandle);

impl Write for OriginalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Replaces the panic hook with one that reports through [`stderr()`].
///
/// The report is written while the panic machinery is on the stack, so it is
/// classified as a stack trace and logged by the configured
/// [`ExceptionHandling`]. A backtrace follows the message when `RUST_BACKTRACE`
/// enables one.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::capture();
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");

        let mut err = stderr();
        // Nowhere to report a failure to report a panic.
        let _ = writeln!(err, "thread '{name}' {info}");
        if backtrace.status() == BacktraceStatus::Captured {
            let _ = writeln!(err, "stack backtrace:\n{backtrace}");
        }
        let _ = err.flush();
    }));
}
