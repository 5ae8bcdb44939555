//! crates/redirect/src/call_origin.rs
//! Classification of why a line is being written.

mod stack_walk;

pub use stack_walk::{StackWalker, caller_path};

use crate::logging_system::LoggingSystemRegistry;

/// Who wrote a line and in what circumstances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOrigin {
    caller: String,
    printing_stack_trace: bool,
    in_logging_system: bool,
}

impl CallOrigin {
    /// Caller identity used when the stack gives no usable frame.
    pub const UNKNOWN_CALLER: &'static str = "unknown";

    /// Builds an origin record.
    pub fn new(
        caller: impl Into<String>,
        printing_stack_trace: bool,
        in_logging_system: bool,
    ) -> Self {
        Self {
            caller: caller.into(),
            printing_stack_trace,
            in_logging_system,
        }
    }

    /// Origin of an ordinary write by `caller`.
    pub fn ordinary(caller: impl Into<String>) -> Self {
        Self::new(caller, false, false)
    }

    /// Origin used when classification fails. The line is still logged.
    #[must_use]
    pub fn unknown() -> Self {
        Self::ordinary(Self::UNKNOWN_CALLER)
    }

    /// Module path of the code that issued the write.
    #[must_use]
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Whether the write happened while a stack trace was being printed.
    #[must_use]
    pub const fn is_printing_stack_trace(&self) -> bool {
        self.printing_stack_trace
    }

    /// Whether the caller belongs to a registered logging system.
    #[must_use]
    pub const fn is_in_logging_system(&self) -> bool {
        self.in_logging_system
    }
}

/// Produces the [`CallOrigin`] of the write currently entering the system.
///
/// Implementations are called on the writing thread, from inside the
/// intercepting stream, so the call stack they observe is the writer's.
pub trait CallOriginSource: Send + Sync {
    /// Classifies the current call, consulting `registry` for logging-system
    /// membership.
    fn call_origin(&self, registry: &LoggingSystemRegistry) -> CallOrigin;
}

/// A source that always reports the same origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedCallOrigin {
    origin: CallOrigin,
}

impl FixedCallOrigin {
    /// Reports `origin` for every call.
    #[must_use]
    pub const fn new(origin: CallOrigin) -> Self {
        Self { origin }
    }
}

impl CallOriginSource for FixedCallOrigin {
    fn call_origin(&self, _registry: &LoggingSystemRegistry) -> CallOrigin {
        self.origin.clone()
    }
}

impl<F> CallOriginSource for F
where
    F: Fn(&LoggingSystemRegistry) -> CallOrigin + Send + Sync,
{
    fn call_origin(&self, registry: &LoggingSystemRegistry) -> CallOrigin {
        self(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_origin_is_logged_as_ordinary_output() {
        let origin = CallOrigin::unknown();
        assert_eq!(origin.caller(), "unknown");
        assert!(!origin.is_printing_stack_trace());
        assert!(!origin.is_in_logging_system());
    }

    #[test]
    fn fixed_source_ignores_registry() {
        let registry = LoggingSystemRegistry::new();
        let source = FixedCallOrigin::new(CallOrigin::new("org::logging", false, true));
        let origin = source.call_origin(&registry);
        assert!(origin.is_in_logging_system());
        assert_eq!(origin.caller(), "org::logging");
    }

    #[test]
    fn closures_classify_against_registry() {
        let registry = LoggingSystemRegistry::new();
        registry.register("org::logging");
        let source = |registry: &LoggingSystemRegistry| {
            let caller = "org::logging::Appender";
            CallOrigin::new(caller, false, registry.contains(caller))
        };
        assert!(source.call_origin(&registry).is_in_logging_system());
    }
}
