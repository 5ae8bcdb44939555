//! crates/redirect/src/line_buffer.rs
//! Byte accumulation and line splitting for intercepted output.

use std::borrow::Cow;

/// A completed line drained from a [`LineBuffer`].
///
/// The raw bytes are kept verbatim, terminator included, so that pass-through
/// writes reproduce exactly what the application wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    raw: Vec<u8>,
    content_len: usize,
}

impl Line {
    fn new(raw: Vec<u8>) -> Self {
        let content_len = if raw.ends_with(b"\r\n") {
            raw.len() - 2
        } else if raw.ends_with(b"\n") {
            raw.len() - 1
        } else {
            raw.len()
        };
        Self { raw, content_len }
    }

    /// The bytes exactly as written, including any terminator.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The bytes without the terminator.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.raw[..self.content_len]
    }

    /// The line content decoded as UTF-8.
    ///
    /// Invalid sequences are replaced rather than rejected: a line is never
    /// dropped because of its encoding.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }

    /// Whether the line ended with a terminator (as opposed to being a partial
    /// tail emitted by an explicit flush).
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.content_len != self.raw.len()
    }
}

/// Growable byte buffer that yields complete lines.
///
/// Both `\n` and `\r\n` terminate a line; a lone `\r` is ordinary content.
/// Nothing is emitted implicitly: complete lines come out of
/// [`drain_complete_lines`](Self::drain_complete_lines), and a trailing
/// partial line only comes out of [`drain_all`](Self::drain_all).
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the pending data.
    pub fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the next appended byte starts a new line.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.bytes.last().is_none_or(|&b| b == b'\n')
    }

    /// Removes and returns every complete line, keeping any partial tail.
    pub fn drain_complete_lines(&mut self) -> Vec<Line> {
        let Some(last) = memchr::memrchr(b'\n', &self.bytes) else {
            return Vec::new();
        };

        let tail = self.bytes.split_off(last + 1);
        let complete = std::mem::replace(&mut self.bytes, tail);

        let mut lines = Vec::new();
        let mut start = 0;
        for end in memchr::memchr_iter(b'\n', &complete) {
            lines.push(Line::new(complete[start..=end].to_vec()));
            start = end + 1;
        }
        lines
    }

    /// Removes and returns every complete line followed by the partial tail,
    /// if any. The buffer is empty afterwards.
    pub fn drain_all(&mut self) -> Vec<Line> {
        let mut lines = self.drain_complete_lines();
        if !self.bytes.is_empty() {
            lines.push(Line::new(std::mem::take(&mut self.bytes)));
        }
        lines
    }
}
