//! crates/redirect/src/channel.rs
//! The two standard output channels and the handles that can occupy them.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::stream::InterceptingStream;

/// One of the process's standard output channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Channel {
    /// Standard output.
    Primary,
    /// Standard error.
    Error,
}

impl Channel {
    /// Both channels, primary first.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Error];

    /// Conventional stream name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "stdout",
            Self::Error => "stderr",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle on a real writer.
///
/// Clones refer to the same writer; [`ptr_eq`](Self::ptr_eq) tells whether
/// two handles do.
#[derive(Clone)]
pub struct RawHandle {
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl RawHandle {
    /// Wraps `writer`.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Handle on the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Handle on the process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Whether both handles refer to the same writer.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Writes all of `bytes` to the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates the writer's error, or reports a poisoned lock.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("output channel lock poisoned"))?
            .write_all(bytes)
    }

    /// Flushes the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates the writer's error, or reports a poisoned lock.
    pub fn flush(&self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("output channel lock poisoned"))?
            .flush()
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHandle")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// What currently occupies a channel.
#[derive(Clone, Debug)]
pub enum ChannelHandle {
    /// The real writer, unintercepted.
    Direct(RawHandle),
    /// An intercepting stream wrapping the real writer.
    Intercepted(Arc<InterceptingStream>),
}

impl ChannelHandle {
    /// Whether the channel is intercepted.
    #[must_use]
    pub const fn is_intercepted(&self) -> bool {
        matches!(self, Self::Intercepted(_))
    }

    /// The real writer beneath any interception.
    #[must_use]
    pub fn original(&self) -> RawHandle {
        match self {
            Self::Direct(raw) => raw.clone(),
            Self::Intercepted(stream) => stream.original().clone(),
        }
    }

    /// The intercepting stream, if any.
    #[must_use]
    pub const fn stream(&self) -> Option<&Arc<InterceptingStream>> {
        match self {
            Self::Direct(_) => None,
            Self::Intercepted(stream) => Some(stream),
        }
    }

    /// Writes `bytes` to whatever occupies the channel.
    ///
    /// # Errors
    ///
    /// Propagates failures of the real writer.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::Direct(raw) => raw.write_all(bytes),
            Self::Intercepted(stream) => stream.write(bytes),
        }
    }

    /// Flushes whatever occupies the channel.
    ///
    /// # Errors
    ///
    /// Propagates failures of the real writer.
    pub fn flush(&self) -> io::Result<()> {
        match self {
            Self::Direct(raw) => raw.flush(),
            Self::Intercepted(stream) => stream.flush(),
        }
    }
}
