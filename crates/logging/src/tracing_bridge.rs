//! crates/logging/src/tracing_bridge.rs
//! Bridge between named-logger records and the tracing crate.
//!
//! Redirected output arrives with a logger name that is only known at run
//! time (the module path of whoever wrote the line). Tracing targets must be
//! static, so records are emitted under the fixed [`TRACING_TARGET`] and carry
//! the logger name in a `logger` field.
//!
//! # Architecture
//!
//! - [`TracingSink`]: a [`LoggerSink`] that turns records into tracing events
//! - [`CaptureLayer`]: a tracing-subscriber layer that turns events back into
//!   [`LogRecord`]s in thread-local storage, for tests and diagnostics
//! - [`init_tracing`] / [`init_tracing_with_filter`]: install a `fmt`
//!   subscriber writing to a chosen writer
//!
//! # Usage
//!
//! ```rust,ignore
//! use logging::{init_tracing, TracingSink};
//!
//! init_tracing(std::io::stderr)?;
//! TracingSink.log("app::net", Severity::Info, "connected");
//! ```

use super::levels::Severity;
use super::sink::LoggerSink;
use super::thread_local::{LogRecord, emit};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;

/// Target used for every event produced by [`TracingSink`].
pub const TRACING_TARGET: &str = "stdio";

/// Name of the event field carrying the originating logger.
pub const LOGGER_FIELD: &str = "logger";

/// A [`LoggerSink`] that emits each record as a tracing event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LoggerSink for TracingSink {
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => tracing::trace!(target: TRACING_TARGET, logger, "{message}"),
            Severity::Debug => tracing::debug!(target: TRACING_TARGET, logger, "{message}"),
            Severity::Info => tracing::info!(target: TRACING_TARGET, logger, "{message}"),
            Severity::Warn => tracing::warn!(target: TRACING_TARGET, logger, "{message}"),
            Severity::Error => tracing::error!(target: TRACING_TARGET, logger, "{message}"),
        }
    }
}

/// A tracing layer that records every event into thread-local storage.
///
/// Events carrying a `logger` field are attributed to that logger; all other
/// events are attributed to their target. Drain them with
/// [`drain_records`](crate::drain_records).
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureLayer;

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let logger = visitor
            .logger
            .unwrap_or_else(|| metadata.target().to_owned());
        emit(LogRecord::new(
            logger,
            Severity::from(metadata.level()),
            visitor.message.unwrap_or_default(),
        ));
    }
}

/// Visitor to extract the message and logger fields from an event.
#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    logger: Option<String>,
}

impl tracing::field::Visit for RecordVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            LOGGER_FIELD => self.logger = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_owned()),
            LOGGER_FIELD => self.logger = Some(value.to_owned()),
            _ => {}
        }
    }
}

/// Initialize a global `fmt` subscriber that writes to `writer`.
///
/// Filtering follows `RUST_LOG` when set and defaults to `info` otherwise.
/// Pass the *original* channel handle here (or register `tracing_subscriber`
/// as a logging system) when standard output is being redirected, otherwise
/// every formatted record is fed back into the redirection pipeline.
pub fn init_tracing<W>(writer: W) -> Result<(), TryInitError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    init_tracing_with_filter(writer, filter)
}

/// Initialize a global `fmt` subscriber with a custom filter layer.
///
/// # Example
///
/// ```rust,ignore
/// use logging::init_tracing_with_filter;
/// use tracing_subscriber::EnvFilter;
///
/// init_tracing_with_filter(std::io::stderr, EnvFilter::new("stdio=debug"))?;
/// ```
pub fn init_tracing_with_filter<W, F>(writer: W, filter: F) -> Result<(), TryInitError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    F: Layer<tracing_subscriber::Registry> + Send + Sync + 'static,
{
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .try_init()
}
