//! crates/redirect/src/channels.rs
//! The active handle of each standard output channel.

use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::channel::{Channel, ChannelHandle, RawHandle};
use crate::config::RedirectConfig;
use crate::context::RedirectContext;
use crate::stream::{AppenderHook, InterceptingStream};
use crate::writer::ChannelWriter;

/// Holds exactly one active handle per [`Channel`] and swaps intercepting
/// streams in and out.
///
/// Installation and restoration are idempotent. A stream always wraps a
/// [`RawHandle`], so streams never stack.
#[derive(Debug)]
pub struct OutputChannels {
    primary: RwLock<ChannelHandle>,
    error: RwLock<ChannelHandle>,
    context: Arc<RedirectContext>,
    config: RwLock<RedirectConfig>,
}

impl OutputChannels {
    /// Registry whose channels start out as `primary` and `error`.
    pub fn new(primary: RawHandle, error: RawHandle, context: Arc<RedirectContext>) -> Self {
        Self::with_config(primary, error, context, RedirectConfig::default())
    }

    /// Like [`new`](Self::new), with `config` applied to installed streams.
    pub fn with_config(
        primary: RawHandle,
        error: RawHandle,
        context: Arc<RedirectContext>,
        config: RedirectConfig,
    ) -> Self {
        Self {
            primary: RwLock::new(ChannelHandle::Direct(primary)),
            error: RwLock::new(ChannelHandle::Direct(error)),
            context,
            config: RwLock::new(config),
        }
    }

    /// Registry over the process's real standard output and error.
    pub fn standard(context: Arc<RedirectContext>, config: RedirectConfig) -> Self {
        Self::with_config(RawHandle::stdout(), RawHandle::stderr(), context, config)
    }

    /// The shared redirection context.
    #[must_use]
    pub const fn context(&self) -> &Arc<RedirectContext> {
        &self.context
    }

    /// Configuration applied by the next [`install`](Self::install).
    #[must_use]
    pub fn config(&self) -> RedirectConfig {
        *self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the configuration. Streams already installed keep theirs.
    pub fn set_config(&self, config: RedirectConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    fn slot(&self, channel: Channel) -> &RwLock<ChannelHandle> {
        match channel {
            Channel::Primary => &self.primary,
            Channel::Error => &self.error,
        }
    }

    fn read(&self, channel: Channel) -> RwLockReadGuard<'_, ChannelHandle> {
        self.slot(channel)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, channel: Channel) -> RwLockWriteGuard<'_, ChannelHandle> {
        self.slot(channel)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Intercepts `channel`, returning the active stream. A no-op when the
    /// channel is already intercepted.
    pub fn install(&self, channel: Channel) -> Arc<InterceptingStream> {
        let config = self.config();
        let (stream, installed) = {
            let mut slot = self.write(channel);
            match &*slot {
                ChannelHandle::Intercepted(stream) => (Arc::clone(stream), false),
                ChannelHandle::Direct(raw) => {
                    let stream = Arc::new(InterceptingStream::from_config(
                        channel,
                        raw.clone(),
                        Arc::clone(&self.context),
                        &config,
                    ));
                    *slot = ChannelHandle::Intercepted(Arc::clone(&stream));
                    (stream, true)
                }
            }
        };
        if installed {
            tracing::debug!(%channel, %config, "installed intercepting stream");
        }
        stream
    }

    /// Puts the original handle back on `channel`, returning the stream
    /// that was removed. A no-op returning `None` when the channel is not
    /// intercepted.
    ///
    /// Lines still buffered in the returned stream are dispatched by
    /// flushing it.
    pub fn restore(&self, channel: Channel) -> Option<Arc<InterceptingStream>> {
        let removed = {
            let mut slot = self.write(channel);
            let ChannelHandle::Intercepted(stream) = &*slot else {
                return None;
            };
            let stream = Arc::clone(stream);
            *slot = ChannelHandle::Direct(stream.original().clone());
            stream
        };
        tracing::debug!(%channel, "restored original handle");
        Some(removed)
    }

    /// Gives `hook` every line `channel` logs, installing interception first
    /// when needed.
    pub fn register_appender_hook(&self, channel: Channel, hook: Arc<dyn AppenderHook>) {
        self.install(channel).set_appender(hook);
        tracing::debug!(%channel, "registered appender hook");
    }

    /// Removes the appender hook of `channel`. A no-op when the channel is
    /// not intercepted.
    pub fn deregister_appender_hook(&self, channel: Channel) {
        if let Some(stream) = self.intercepting_stream(channel) {
            stream.clear_appender();
            tracing::debug!(%channel, "deregistered appender hook");
        }
    }

    /// The real writer behind `channel`, whether or not it is intercepted.
    #[must_use]
    pub fn original_handle(&self, channel: Channel) -> RawHandle {
        self.read(channel).original()
    }

    /// Snapshot of what currently occupies `channel`.
    #[must_use]
    pub fn active_handle(&self, channel: Channel) -> ChannelHandle {
        self.read(channel).clone()
    }

    /// The installed stream, if `channel` is intercepted.
    #[must_use]
    pub fn intercepting_stream(&self, channel: Channel) -> Option<Arc<InterceptingStream>> {
        self.read(channel).stream().cloned()
    }

    /// Whether `channel` is intercepted.
    #[must_use]
    pub fn is_intercepting(&self, channel: Channel) -> bool {
        self.read(channel).is_intercepted()
    }

    /// Suspends the stream on `channel`, if any; see
    /// [`InterceptingStream::suspend`].
    ///
    /// # Errors
    ///
    /// Propagates failures from flushing the buffered lines.
    pub fn suspend(&self, channel: Channel) -> io::Result<()> {
        match self.intercepting_stream(channel) {
            Some(stream) => stream.suspend(),
            None => Ok(()),
        }
    }

    /// Resumes the stream on `channel`, if any.
    pub fn resume(&self, channel: Channel) {
        if let Some(stream) = self.intercepting_stream(channel) {
            stream.resume();
        }
    }

    /// A writer onto whatever occupies `channel` at the time of each write.
    #[must_use]
    pub fn writer(self: &Arc<Self>, channel: Channel) -> ChannelWriter {
        ChannelWriter::new(Arc::clone(self), channel)
    }
}
