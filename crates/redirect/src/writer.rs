//! crates/redirect/src/writer.rs
//! `io::Write` access to whatever currently occupies a channel.

use std::io::{self, Write};
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;

use crate::channel::Channel;
use crate::channels::OutputChannels;

/// Writer onto a channel of an [`OutputChannels`] registry.
///
/// The active handle is looked up on every write, so a writer obtained before
/// [`install`](OutputChannels::install) is redirected afterwards. When the
/// channel is intercepted, every write containing a line terminator
/// dispatches the completed lines immediately; a trailing partial line stays
/// buffered until a later terminator or an explicit [`flush`](Write::flush).
///
/// The writer doubles as a [`MakeWriter`], so a `tracing-subscriber` `fmt`
/// layer can target a redirected channel.
#[derive(Clone, Debug)]
pub struct ChannelWriter {
    channels: Arc<OutputChannels>,
    channel: Channel,
}

impl ChannelWriter {
    /// Writer onto `channel` of `channels`.
    #[must_use]
    pub const fn new(channels: Arc<OutputChannels>, channel: Channel) -> Self {
        Self { channels, channel }
    }

    /// The channel written to.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let handle = self.channels.active_handle(self.channel);
        handle.write_all(buf)?;
        if let Some(stream) = handle.stream() {
            if memchr::memchr(b'\n', buf).is_some() {
                stream.flush_complete_lines()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.channels.active_handle(self.channel).flush()
    }
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
