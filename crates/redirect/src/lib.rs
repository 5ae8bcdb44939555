#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! crates/redirect/src/lib.rs
//!
//! # Overview
//!
//! `redirect` turns output written to the standard channels into log
//! records. An [`OutputChannels`] registry holds the active handle of each
//! [`Channel`]; installing interception replaces the real writer with an
//! [`InterceptingStream`] that buffers bytes, splits them into lines and
//! routes each line according to its [`CallOrigin`]:
//!
//! - output from a registered logging system is passed through to the real
//!   writer untouched, so a console logger never feeds back into itself;
//! - lines printed as part of a stack trace go to an
//!   [`ExceptionHandlingStrategy`];
//! - anything else becomes a record at the channel's configured severity,
//!   named after the module that wrote it.
//!
//! Rust offers no way to swap the process's `stdout` in place, so
//! application code writes through a [`ChannelWriter`] obtained from the
//! registry. The writer is also a `tracing-subscriber` `MakeWriter`.
//!
//! # Design
//!
//! - [`LineBuffer`] owns no policy. Both `\n` and `\r\n` end a line and
//!   partial content only leaves the buffer on an explicit flush.
//! - [`CallOriginSource`] is the seam around stack inspection.
//!   [`StackWalker`] is the production implementation and
//!   [`FixedCallOrigin`] the deterministic one.
//! - [`RedirectContext`] carries the state shared by both channels: the
//!   [`LoggingSystemRegistry`], the one-time advisory flag, the log sink and
//!   the call-origin source.
//! - Each stream guards its buffer, pending origins and strategy with one
//!   mutex, so append, drain and dispatch are atomic per channel.
//! - While a thread dispatches a line, further writes it makes to any
//!   intercepted channel go straight to the original writer
//!   ([`is_dispatching`]).
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//! use logging::{CapturingSink, Severity, drain_records};
//! use redirect::{
//!     CallOrigin, Channel, FixedCallOrigin, OutputChannels, RawHandle, RedirectContext,
//! };
//!
//! let context = RedirectContext::builder()
//!     .sink(Arc::new(CapturingSink))
//!     .call_origin_source(Arc::new(FixedCallOrigin::new(CallOrigin::ordinary("app"))))
//!     .build();
//! let channels = Arc::new(OutputChannels::new(
//!     RawHandle::new(std::io::sink()),
//!     RawHandle::new(std::io::sink()),
//!     Arc::new(context),
//! ));
//!
//! channels.install(Channel::Primary);
//! writeln!(channels.writer(Channel::Primary), "hello").unwrap();
//!
//! let records = drain_records();
//! assert_eq!(records[0].logger, "app");
//! assert_eq!(records[0].severity, Severity::Info);
//! assert_eq!(records[0].message, "hello");
//! ```

mod call_origin;
mod channel;
mod channels;
mod config;
mod context;
mod exception;
mod line_buffer;
mod logging_system;
mod stream;
mod writer;

pub use call_origin::{CallOrigin, CallOriginSource, FixedCallOrigin, StackWalker, caller_path};
pub use channel::{Channel, ChannelHandle, RawHandle};
pub use channels::OutputChannels;
pub use config::{CONFIG_ENV, ConfigError, RedirectConfig};
pub use context::{RedirectContext, RedirectContextBuilder};
pub use exception::{
    ExceptionHandling, ExceptionHandlingStrategy, LogPerLine, LogToSingleRecord,
    ParseExceptionHandlingError,
};
pub use line_buffer::{Line, LineBuffer};
pub use logging_system::{KNOWN_LOGGING_SYSTEMS, LoggingSystemRegistry};
pub use stream::{AppenderHook, InterceptingStream, LineEvent, PERFORMANCE_ADVISORY, is_dispatching};
pub use writer::ChannelWriter;
