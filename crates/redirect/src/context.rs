//! crates/redirect/src/context.rs
//! Process-wide state shared by every intercepting stream.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logging::{Logger, LoggerSink, TracingSink};

use crate::call_origin::{CallOrigin, CallOriginSource, StackWalker};
use crate::logging_system::LoggingSystemRegistry;

/// State shared by the streams installed on both channels: the logging-system
/// registry, the advisory flag, the log sink and the call-origin source.
///
/// A context is built once and handed to [`OutputChannels`](crate::OutputChannels);
/// nothing in it is reset implicitly.
pub struct RedirectContext {
    registry: LoggingSystemRegistry,
    warned: AtomicBool,
    sink: Arc<dyn LoggerSink>,
    origins: Arc<dyn CallOriginSource>,
}

impl RedirectContext {
    /// Context with an empty registry, logging through `sink` and
    /// classifying writes with `origins`.
    pub fn new(sink: Arc<dyn LoggerSink>, origins: Arc<dyn CallOriginSource>) -> Self {
        Self {
            registry: LoggingSystemRegistry::new(),
            warned: AtomicBool::new(false),
            sink,
            origins,
        }
    }

    /// Starts a builder with the production sink and call-origin source.
    #[must_use]
    pub fn builder() -> RedirectContextBuilder {
        RedirectContextBuilder::default()
    }

    /// The logging-system registry.
    #[must_use]
    pub const fn registry(&self) -> &LoggingSystemRegistry {
        &self.registry
    }

    /// A logger named `name` on the context's sink.
    #[must_use]
    pub fn logger(&self, name: &str) -> Logger {
        Logger::new(name, Arc::clone(&self.sink))
    }

    /// Classifies the current call.
    #[must_use]
    pub fn call_origin(&self) -> CallOrigin {
        self.origins.call_origin(&self.registry)
    }

    /// Whether the performance advisory has been emitted.
    #[must_use]
    pub fn has_warned(&self) -> bool {
        self.warned.load(Ordering::Acquire)
    }

    /// Sets the advisory flag, returning `true` only for the call that set it.
    pub(crate) fn claim_warning(&self) -> bool {
        self.warned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for RedirectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectContext")
            .field("registry", &self.registry)
            .field("warned", &self.has_warned())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RedirectContext`].
#[derive(Default)]
pub struct RedirectContextBuilder {
    sink: Option<Arc<dyn LoggerSink>>,
    origins: Option<Arc<dyn CallOriginSource>>,
    systems: Vec<String>,
    known_systems: bool,
}

impl RedirectContextBuilder {
    /// Logs through `sink` instead of [`TracingSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Classifies writes with `origins` instead of a [`StackWalker`].
    #[must_use]
    pub fn call_origin_source(mut self, origins: Arc<dyn CallOriginSource>) -> Self {
        self.origins = Some(origins);
        self
    }

    /// Pre-registers `prefix` as a logging system.
    #[must_use]
    pub fn logging_system(mut self, prefix: impl Into<String>) -> Self {
        self.systems.push(prefix.into());
        self
    }

    /// Pre-registers [`KNOWN_LOGGING_SYSTEMS`](crate::KNOWN_LOGGING_SYSTEMS).
    #[must_use]
    pub const fn known_logging_systems(mut self) -> Self {
        self.known_systems = true;
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RedirectContext {
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let origins = self
            .origins
            .unwrap_or_else(|| Arc::new(StackWalker::new()));
        let context = RedirectContext {
            registry: if self.known_systems {
                LoggingSystemRegistry::with_known_systems()
            } else {
                LoggingSystemRegistry::new()
            },
            warned: AtomicBool::new(false),
            sink,
            origins,
        };
        for prefix in &self.systems {
            context.registry.register(prefix);
        }
        context
    }
}
