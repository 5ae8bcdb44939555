//! Doubles shared by the redirect integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use logging::{Logger, Severity};
use redirect::{
    CallOrigin, CallOriginSource, Channel, ExceptionHandlingStrategy, InterceptingStream,
    LoggingSystemRegistry, RawHandle, RedirectContext,
};
use test_support::{MemorySink, SharedBuffer};

pub const CLASS_NAME: &str = "org::something::some_module";
pub const IN_LOGGING_SYSTEM: &str = "org::logging::appender";

/// One call observed by a [`RecordingStrategy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyCall {
    ExceptionLine { line: String, logger: String },
    NotStackTrace,
}

/// Strategy that records its calls; clones share the record.
#[derive(Clone, Debug, Default)]
pub struct RecordingStrategy {
    calls: Arc<Mutex<Vec<StrategyCall>>>,
}

impl RecordingStrategy {
    pub fn calls(&self) -> Vec<StrategyCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, call: StrategyCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl ExceptionHandlingStrategy for RecordingStrategy {
    fn handle_exception_line(&mut self, line: &str, logger: &Logger) {
        self.push(StrategyCall::ExceptionLine {
            line: line.to_owned(),
            logger: logger.name().to_owned(),
        });
    }

    fn notify_not_stack_trace(&mut self) {
        self.push(StrategyCall::NotStackTrace);
    }
}

/// Origin source whose answer can be changed between writes.
#[derive(Clone, Debug)]
pub struct ScriptedOrigin {
    current: Arc<Mutex<CallOrigin>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedOrigin {
    pub fn new(origin: CallOrigin) -> Self {
        Self {
            current: Arc::new(Mutex::new(origin)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set(&self, origin: CallOrigin) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = origin;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallOriginSource for ScriptedOrigin {
    fn call_origin(&self, _registry: &LoggingSystemRegistry) -> CallOrigin {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// An intercepting stream over in-memory collaborators.
pub struct Fixture {
    pub stream: InterceptingStream,
    pub original: SharedBuffer,
    pub sink: MemorySink,
    pub strategy: RecordingStrategy,
    pub origin: ScriptedOrigin,
    pub context: Arc<RedirectContext>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_origin(CallOrigin::ordinary(CLASS_NAME))
    }

    pub fn with_origin(origin: CallOrigin) -> Self {
        let original = SharedBuffer::new();
        let sink = MemorySink::new();
        let strategy = RecordingStrategy::default();
        let origin = ScriptedOrigin::new(origin);
        let context = Arc::new(
            RedirectContext::builder()
                .sink(Arc::new(sink.clone()))
                .call_origin_source(Arc::new(origin.clone()))
                .build(),
        );
        let stream = InterceptingStream::new(
            Channel::Primary,
            RawHandle::new(original.clone()),
            Arc::clone(&context),
            Severity::Info,
            Box::new(strategy.clone()),
            Severity::Error,
        );
        Self {
            stream,
            original,
            sink,
            strategy,
            origin,
            context,
        }
    }
}

pub fn logging_system_origin() -> CallOrigin {
    CallOrigin::new(IN_LOGGING_SYSTEM, false, true)
}

pub fn stack_trace_origin() -> CallOrigin {
    CallOrigin::new(CLASS_NAME, true, false)
}
