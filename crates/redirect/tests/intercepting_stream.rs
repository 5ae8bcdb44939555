//! Integration tests for line routing in [`InterceptingStream`].
//!
//! The call origin is scripted so every routing path (ordinary output,
//! stack traces, logging-system feedback) can be driven deterministically.

mod common;

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use common::{
    CLASS_NAME, Fixture, IN_LOGGING_SYSTEM, RecordingStrategy, StrategyCall,
    logging_system_origin, stack_trace_origin,
};
use logging::{LogRecord, LoggerSink, Severity};
use redirect::{
    CallOrigin, Channel, FixedCallOrigin, InterceptingStream, LineEvent, PERFORMANCE_ADVISORY,
    RawHandle, RedirectContext,
};
use test_support::{FailingWriter, MemorySink, SharedBuffer};

const ADVISORY_LOGGER: &str = "redirect::stream";

fn info(message: &str) -> LogRecord {
    LogRecord::new(CLASS_NAME, Severity::Info, message)
}

// ============================================================================
// Line Splitting
// ============================================================================

/// Verifies a `\n`-terminated line becomes one record without the terminator.
#[test]
fn flush_logs_when_message_ends_with_unix_line_break() {
    let fx = Fixture::new();
    fx.stream.write(b"the message\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("the message")]);
}

/// Verifies the whole `\r\n` terminator is stripped.
#[test]
fn flush_logs_when_message_ends_with_windows_line_break() {
    let fx = Fixture::new();
    fx.stream.write(b"the message\r\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("the message")]);
}

/// Verifies partial writes are concatenated and the buffer is reset.
#[test]
fn flush_resets_buffer() {
    let fx = Fixture::new();
    fx.stream.write(b"1").unwrap();
    fx.stream.write(b"2\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("12")]);

    fx.stream.write(b"3").unwrap();
    fx.stream.write(b"4\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("12"), info("34")]);
}

/// Verifies an explicit flush emits unterminated content.
#[test]
fn flush_without_terminator_emits_partial_line() {
    let fx = Fixture::new();
    fx.stream.write(b"x").unwrap();
    assert!(fx.sink.records().is_empty());

    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("x")]);
    assert_eq!(fx.stream.buffered_len(), 0);

    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records().len(), 1);
}

/// Verifies one write carrying several lines yields one record per line.
#[test]
fn several_lines_in_one_write() {
    let fx = Fixture::new();
    fx.stream.write(b"one\ntwo\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.records(), vec![info("one"), info("two")]);
    assert_eq!(fx.origin.calls(), 1);
}

/// Verifies complete-line flushing leaves the partial tail for later.
#[test]
fn flush_complete_lines_keeps_tail() {
    let fx = Fixture::new();
    fx.stream.write(b"done\npend").unwrap();
    fx.stream.flush_complete_lines().unwrap();
    assert_eq!(fx.sink.messages(), vec!["done"]);
    assert_eq!(fx.stream.buffered_len(), 4);

    fx.stream.write(b"ing\n").unwrap();
    fx.stream.flush_complete_lines().unwrap();
    assert_eq!(fx.sink.messages(), vec!["done", "pending"]);
}

/// Verifies undecodable bytes are replaced rather than dropped.
#[test]
fn invalid_utf8_is_logged_lossily() {
    let fx = Fixture::new();
    fx.stream.write(b"caf\xe9\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.messages(), vec!["caf\u{fffd}"]);
}

/// Verifies empty writes do not consult the call-origin source.
#[test]
fn empty_write_is_ignored() {
    let fx = Fixture::new();
    fx.stream.write(b"").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.origin.calls(), 0);
    assert!(fx.sink.records().is_empty());
}

// ============================================================================
// Call Origin
// ============================================================================

/// Verifies attribution uses the origin of the write that opened the line.
#[test]
fn origin_is_taken_when_the_line_starts() {
    let fx = Fixture::with_origin(CallOrigin::ordinary("app::first"));
    fx.stream.write(b"a").unwrap();
    fx.origin.set(CallOrigin::ordinary("app::second"));
    fx.stream.write(b"b\nc").unwrap();
    fx.origin.set(CallOrigin::ordinary("app::third"));
    fx.stream.flush().unwrap();

    assert_eq!(
        fx.sink.records(),
        vec![
            LogRecord::new("app::first", Severity::Info, "ab"),
            LogRecord::new("app::second", Severity::Info, "c"),
        ]
    );
}

/// Verifies ordinary output notifies the strategy exactly once per line.
#[test]
fn flush_non_stack_trace_notifies_not_stack_trace() {
    let fx = Fixture::new();
    fx.stream.write(b"some text\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.strategy.calls(), vec![StrategyCall::NotStackTrace]);
    assert_eq!(fx.sink.records(), vec![info("some text")]);
}

/// Verifies trace lines reach the strategy with the caller's logger only.
#[test]
fn flush_stack_trace_calls_exception_handling_strategy() {
    let fx = Fixture::with_origin(stack_trace_origin());
    fx.stream.write(b"exception line\n").unwrap();
    fx.stream.flush().unwrap();

    assert_eq!(
        fx.strategy.calls(),
        vec![StrategyCall::ExceptionLine {
            line: "exception line".to_owned(),
            logger: CLASS_NAME.to_owned(),
        }]
    );
    assert!(fx.sink.records().is_empty());
}

// ============================================================================
// Logging-System Feedback
// ============================================================================

/// Verifies logging-system output reaches the original channel unchanged.
#[test]
fn flush_writes_to_original_if_in_logging_system() {
    let fx = Fixture::with_origin(logging_system_origin());
    fx.stream.write(b"twelve chars").unwrap();
    fx.stream.flush().unwrap();

    assert_eq!(fx.original.contents(), b"twelve chars");
    assert_eq!(fx.original.flush_count(), 1);
    assert_eq!(fx.strategy.calls(), vec![StrategyCall::NotStackTrace]);
    assert!(fx.sink.records_for(IN_LOGGING_SYSTEM).is_empty());
}

/// Verifies terminators are passed through with the line.
#[test]
fn pass_through_keeps_terminators() {
    let fx = Fixture::with_origin(logging_system_origin());
    fx.stream.write(b"INFO first\r\nINFO second\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.original.contents(), b"INFO first\r\nINFO second\n");
}

/// Verifies the advisory is logged exactly once per context.
#[test]
fn flush_warns_once_if_in_logging_system() {
    let fx = Fixture::with_origin(logging_system_origin());
    assert!(!fx.context.has_warned());

    for _ in 0..5 {
        fx.stream.write(b"twelve chars").unwrap();
        fx.stream.flush().unwrap();
    }

    assert_eq!(
        fx.sink.records(),
        vec![LogRecord::new(
            ADVISORY_LOGGER,
            Severity::Warn,
            PERFORMANCE_ADVISORY
        )]
    );
    assert!(fx.context.has_warned());
}

/// Verifies the logging-system path wins over the stack-trace flag.
#[test]
fn logging_system_trace_is_passed_through() {
    let fx = Fixture::with_origin(CallOrigin::new(IN_LOGGING_SYSTEM, true, true));
    fx.stream.write(b"   0: fern::log\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.strategy.calls(), vec![StrategyCall::NotStackTrace]);
    assert_eq!(fx.original.contents_lossy(), "   0: fern::log\n");
}

/// Verifies a failing original channel surfaces its error.
#[test]
fn pass_through_failure_is_propagated() {
    let sink = MemorySink::new();
    let context = Arc::new(
        RedirectContext::builder()
            .sink(Arc::new(sink.clone()))
            .call_origin_source(Arc::new(FixedCallOrigin::new(logging_system_origin())))
            .build(),
    );
    let stream = InterceptingStream::new(
        Channel::Error,
        RawHandle::new(FailingWriter),
        context,
        Severity::Warn,
        Box::new(RecordingStrategy::default()),
        Severity::Error,
    );

    stream.write(b"lost\n").unwrap();
    let err = stream.flush().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert!(sink.records().is_empty());
}

// ============================================================================
// Suspension, Hooks and Re-entrancy
// ============================================================================

/// Verifies a suspended stream writes straight through.
#[test]
fn suspended_stream_passes_through() {
    let fx = Fixture::new();
    fx.stream.write(b"before").unwrap();
    fx.stream.suspend().unwrap();
    assert!(fx.stream.is_suspended());
    assert_eq!(fx.sink.messages(), vec!["before"]);

    fx.stream.write(b"raw\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.original.contents(), b"raw\n");
    assert_eq!(fx.sink.records().len(), 1);

    fx.stream.resume();
    fx.stream.write(b"after\n").unwrap();
    fx.stream.flush().unwrap();
    assert_eq!(fx.sink.messages(), vec!["before", "after"]);
}

/// Verifies the appender hook sees logged lines but not feedback.
#[test]
fn appender_hook_sees_logged_lines() {
    #[derive(Debug, PartialEq, Eq)]
    struct Seen {
        logger: String,
        severity: Severity,
        message: String,
        stack_trace: bool,
    }

    let fx = Fixture::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook_seen = Arc::clone(&seen);
    fx.stream.set_appender(Arc::new(move |event: &LineEvent<'_>| {
        assert_eq!(event.channel, Channel::Primary);
        hook_seen.lock().unwrap().push(Seen {
            logger: event.logger.to_owned(),
            severity: event.severity,
            message: event.message.to_owned(),
            stack_trace: event.stack_trace,
        });
    }));
    assert!(fx.stream.has_appender());

    fx.stream.write(b"plain\n").unwrap();
    fx.stream.flush().unwrap();
    fx.origin.set(stack_trace_origin());
    fx.stream.write(b"trace\n").unwrap();
    fx.stream.flush().unwrap();
    fx.origin.set(logging_system_origin());
    fx.stream.write(b"feedback\n").unwrap();
    fx.stream.flush().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Seen {
                logger: CLASS_NAME.to_owned(),
                severity: Severity::Info,
                message: "plain".to_owned(),
                stack_trace: false,
            },
            Seen {
                logger: CLASS_NAME.to_owned(),
                severity: Severity::Error,
                message: "trace".to_owned(),
                stack_trace: true,
            },
        ]
    );

    fx.stream.clear_appender();
    assert!(!fx.stream.has_appender());
}

/// A sink that echoes every record back into the stream it logs for.
struct EchoSink {
    records: MemorySink,
    stream: OnceLock<Arc<InterceptingStream>>,
}

impl LoggerSink for EchoSink {
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        self.records.log(logger, severity, message);
        if let Some(stream) = self.stream.get() {
            stream.write(format!("{severity} {message}\n").as_bytes()).unwrap();
            stream.flush().unwrap();
        }
    }
}

/// Verifies writes made while dispatching go to the original channel.
#[test]
fn writes_during_dispatch_bypass_the_logger() {
    let original = SharedBuffer::new();
    let sink = Arc::new(EchoSink {
        records: MemorySink::new(),
        stream: OnceLock::new(),
    });
    let context = Arc::new(
        RedirectContext::builder()
            .sink(Arc::clone(&sink) as Arc<dyn LoggerSink>)
            .call_origin_source(Arc::new(FixedCallOrigin::new(CallOrigin::ordinary(
                CLASS_NAME,
            ))))
            .build(),
    );
    let stream = Arc::new(InterceptingStream::new(
        Channel::Primary,
        RawHandle::new(original.clone()),
        context,
        Severity::Info,
        Box::new(RecordingStrategy::default()),
        Severity::Error,
    ));
    sink.stream.set(Arc::clone(&stream)).unwrap();

    stream.write(b"hello\n").unwrap();
    stream.flush().unwrap();

    assert_eq!(sink.records.records(), vec![info("hello")]);
    assert_eq!(original.contents_lossy(), "info hello\n");
    assert!(!redirect::is_dispatching());
}

/// A sink that panics on its first record and records the rest.
struct PanicsOnce {
    panicked: AtomicBool,
    records: MemorySink,
}

impl LoggerSink for PanicsOnce {
    fn log(&self, logger: &str, severity: Severity, message: &str) {
        assert!(
            self.panicked.swap(true, Ordering::SeqCst),
            "sink failed on '{message}'"
        );
        self.records.log(logger, severity, message);
    }
}

/// Verifies a panicking sink leaves the stream usable for later lines.
#[test]
fn stream_survives_a_panicking_sink() {
    let original = SharedBuffer::new();
    let sink = Arc::new(PanicsOnce {
        panicked: AtomicBool::new(false),
        records: MemorySink::new(),
    });
    let context = Arc::new(
        RedirectContext::builder()
            .sink(Arc::clone(&sink) as Arc<dyn LoggerSink>)
            .call_origin_source(Arc::new(FixedCallOrigin::new(CallOrigin::ordinary(
                CLASS_NAME,
            ))))
            .build(),
    );
    let stream = InterceptingStream::new(
        Channel::Primary,
        RawHandle::new(original.clone()),
        context,
        Severity::Info,
        Box::new(RecordingStrategy::default()),
        Severity::Error,
    );

    stream.write(b"first\n").unwrap();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| stream.flush()));
    assert!(outcome.is_err());
    assert!(!redirect::is_dispatching());

    stream.write(b"second\n").unwrap();
    stream.flush().unwrap();
    assert_eq!(sink.records.records(), vec![info("second")]);
    assert_eq!(stream.buffered_len(), 0);
    assert!(original.contents_lossy().is_empty());
}

/// Verifies concurrent writers never split or merge lines.
#[test]
fn concurrent_writes_keep_lines_whole() {
    let fx = Fixture::new();
    let stream = Arc::new(fx.stream);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let stream = Arc::clone(&stream);
            std::thread::spawn(move || {
                for i in 0..50 {
                    stream
                        .write(format!("thread {t} line {i}\n").as_bytes())
                        .unwrap();
                    stream.flush().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut messages = fx.sink.messages();
    assert_eq!(messages.len(), 400);
    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), 400);
    assert!(messages.iter().all(|m| m.starts_with("thread ")));
}
