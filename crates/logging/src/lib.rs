#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! crates/logging/src/lib.rs
//!
//! # Overview
//!
//! `logging` is the logger collaborator used by the redirection core. It
//! defines the [`Severity`] scale, the [`LoggerSink`] trait that receives
//! records, and [`Logger`], a cheap named handle onto a sink. Redirected lines
//! are attributed to the module that wrote them, so logger names are runtime
//! strings rather than static targets.
//!
//! # Sinks
//!
//! - [`CapturingSink`] stores records in thread-local storage; drain them with
//!   [`drain_records`]. Tests rely on it because redirection dispatches
//!   synchronously on the writing thread.
//! - `TracingSink` (feature `tracing`) emits tracing events under the `stdio`
//!   target with a `logger` field. `CaptureLayer` performs the reverse
//!   mapping for subscribers under test.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use logging::{CapturingSink, Logger, Severity, drain_records};
//!
//! let logger = Logger::new("app::net", Arc::new(CapturingSink));
//! logger.log(Severity::Info, "connected");
//!
//! let records = drain_records();
//! assert_eq!(records[0].logger, "app::net");
//! assert_eq!(records[0].message, "connected");
//! ```

mod levels;
mod sink;
mod thread_local;
#[cfg(feature = "tracing")]
mod tracing_bridge;

pub use levels::{ParseSeverityError, Severity};
pub use sink::{Logger, LoggerSink};
pub use thread_local::{CapturingSink, LogRecord, drain_records, emit};
#[cfg(feature = "tracing")]
pub use tracing_bridge::{
    CaptureLayer, LOGGER_FIELD, TRACING_TARGET, TracingSink, init_tracing,
    init_tracing_with_filter,
};
