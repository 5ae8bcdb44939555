//! crates/redirect/src/call_origin/stack_walk.rs
//! Call-origin classification by walking the live call stack.
//!
//! Frames are resolved to demangled symbol names and reduced to a module path:
//!
//! - `app::net::connect` → `app::net`
//! - `app::net::Conn::send::{{closure}}` → `app::net::Conn`
//! - `<app::Report as core::fmt::Display>::fmt` → `app::Report`
//! - `<&mut W as std::io::Write>::write_all` → `std::io::Write`
//!
//! Walking starts at the interception point. Frames from this crate, from
//! the standard library, and from unqualified platform symbols are skipped;
//! the first remaining frame is the caller. Any skipped frame belonging to a
//! trace printer (the panic machinery or a backtrace formatter) marks the
//! write as part of a stack trace.

use super::{CallOrigin, CallOriginSource};
use crate::logging_system::{LoggingSystemRegistry, path_starts_with};

/// Crates whose frames are never the caller.
const PLATFORM_CRATES: &[&str] = &["std", "core", "alloc", "backtrace"];

/// Symbol fragments that identify code printing a stack trace.
const TRACE_PRINTERS: &[&str] = &[
    "std::panicking::",
    "core::panicking::",
    "std::backtrace::",
    "backtrace::capture::",
];

/// The production [`CallOriginSource`], backed by the `backtrace` crate.
#[derive(Clone, Debug)]
pub struct StackWalker {
    internal: Vec<String>,
}

impl Default for StackWalker {
    fn default() -> Self {
        Self {
            internal: vec![env!("CARGO_CRATE_NAME").to_owned()],
        }
    }
}

impl StackWalker {
    /// Creates a walker that treats this crate's frames as internal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats frames under `prefix` as part of the interception machinery.
    ///
    /// Wrappers that sit between application code and the redirected
    /// channel (a facade crate, a panic hook) register themselves here so the
    /// caller is reported as the code that called *them*.
    pub fn with_internal_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.internal.push(prefix.into());
        self
    }

    fn is_skipped(&self, path: &str) -> bool {
        PLATFORM_CRATES
            .iter()
            .copied()
            .chain(self.internal.iter().map(String::as_str))
            .any(|prefix| path_starts_with(path, prefix))
    }
}

impl CallOriginSource for StackWalker {
    fn call_origin(&self, registry: &LoggingSystemRegistry) -> CallOrigin {
        let mut printing_stack_trace = false;
        let mut caller: Option<String> = None;

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                if caller.is_some() {
                    return;
                }
                let Some(name) = symbol.name() else {
                    return;
                };
                let name = format!("{name:#}");
                if is_trace_printer(&name) {
                    printing_stack_trace = true;
                    return;
                }
                if let Some(path) = caller_path(&name) {
                    if !self.is_skipped(&path) {
                        caller = Some(path);
                    }
                }
            });
            caller.is_none()
        });

        match caller {
            Some(caller) => {
                let in_logging_system = registry.contains(&caller);
                CallOrigin::new(caller, printing_stack_trace, in_logging_system)
            }
            None => CallOrigin::unknown(),
        }
    }
}

fn is_trace_printer(symbol: &str) -> bool {
    TRACE_PRINTERS.iter().any(|marker| symbol.contains(marker))
}

/// Reduces a demangled symbol name to the module path used as caller identity.
///
/// Returns `None` for symbols that carry no module path, such as C runtime
/// entry points.
#[must_use]
pub fn caller_path(symbol: &str) -> Option<String> {
    let symbol = strip_hash(symbol.trim());

    if let Some(rest) = symbol.strip_prefix('<') {
        let close = matching_angle(rest)?;
        let qualified = &rest[..close];
        let (self_ty, trait_ty) = match split_top_level_as(qualified) {
            Some((self_ty, trait_ty)) => (self_ty, Some(trait_ty)),
            None => (qualified, None),
        };
        return type_path(self_ty).or_else(|| trait_ty.and_then(type_path));
    }

    let mut segments = path_segments(symbol);
    if segments.len() < 2 {
        return None;
    }
    segments.pop();
    Some(segments.join("::"))
}

/// Drops a legacy-mangling hash suffix (`::h0123456789abcdef`).
fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::") {
        Some((head, hash))
            if hash.len() == 17
                && hash.starts_with('h')
                && hash[1..].bytes().all(|b| b.is_ascii_hexdigit()) =>
        {
            head
        }
        _ => symbol,
    }
}

/// Index of the `>` closing the `<` that preceded `s`, ignoring `->`.
fn matching_angle(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' if depth == 0 => return Some(i),
            b'>' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Splits `T as Trait` at the top-level ` as `.
fn split_top_level_as(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => depth = depth.saturating_sub(1),
            b' ' if depth == 0 && s[i..].starts_with(" as ") => {
                return Some((&s[..i], &s[i + 4..]));
            }
            _ => {}
        }
    }
    None
}

/// Path of a type expression, or `None` when it is not a qualified path
/// (generic parameters, primitives, slices, tuples).
fn type_path(ty: &str) -> Option<String> {
    let mut ty = ty.trim();
    for prefix in ["&mut ", "&", "*const ", "*mut ", "dyn ", "impl "] {
        if let Some(rest) = ty.strip_prefix(prefix) {
            ty = rest.trim_start();
        }
    }
    let segments = path_segments(ty);
    if segments.len() < 2 {
        return None;
    }
    Some(segments.join("::"))
}

/// `::`-separated segments with generic arguments and closure/shim markers
/// removed.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                if depth == 0 && i > start {
                    segments.push(&path[start..i]);
                }
                depth += 1;
            }
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    start = i + 1;
                }
            }
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                if i > start {
                    segments.push(&path[start..i]);
                }
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if depth == 0 && start < bytes.len() {
        segments.push(&path[start..]);
    }

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect()
}
