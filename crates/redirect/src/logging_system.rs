//! crates/redirect/src/logging_system.rs
//! Registry of module paths that belong to a logging system.

use std::sync::{PoisonError, RwLock};

/// Module-path prefixes whose writes to a redirected channel are feedback
/// from a logging system and must be passed through rather than logged.
///
/// Prefixes match on path segments: `tracing_subscriber` matches
/// `tracing_subscriber` and `tracing_subscriber::fmt`, but not
/// `tracing_subscriber_ext`. Entries are only ever added during normal
/// operation; [`clear`](Self::clear) exists for a full reset.
#[derive(Debug, Default)]
pub struct LoggingSystemRegistry {
    prefixes: RwLock<Vec<String>>,
}

/// Module prefixes of logging backends commonly found in Rust programs.
pub const KNOWN_LOGGING_SYSTEMS: &[&str] = &[
    "tracing_subscriber",
    "tracing_appender",
    "env_logger",
    "log4rs",
    "fern",
    "simplelog",
    "flexi_logger",
];

impl LoggingSystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with [`KNOWN_LOGGING_SYSTEMS`].
    #[must_use]
    pub fn with_known_systems() -> Self {
        let registry = Self::new();
        for prefix in KNOWN_LOGGING_SYSTEMS {
            registry.register(prefix);
        }
        registry
    }

    /// Adds `prefix` to the registry. Registering the same prefix twice has no
    /// further effect.
    pub fn register(&self, prefix: &str) {
        let prefix = prefix.trim_end_matches("::");
        if prefix.is_empty() {
            return;
        }
        {
            let mut prefixes = self
                .prefixes
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if prefixes.iter().any(|p| p == prefix) {
                return;
            }
            prefixes.push(prefix.to_owned());
        }
        // Logged outside the lock: the subscriber may itself write to a
        // redirected channel, which reads this registry.
        tracing::debug!(prefix, "registered logging system");
    }

    /// Whether exactly `prefix` has been registered.
    #[must_use]
    pub fn is_registered(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches("::");
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p == prefix)
    }

    /// Whether `identity` (a module path) lies inside any registered prefix.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|prefix| path_starts_with(identity, prefix))
    }

    /// Snapshot of the registered prefixes, in registration order.
    #[must_use]
    pub fn prefixes(&self) -> Vec<String> {
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.prefixes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Segment-aware prefix test on `::`-separated paths.
pub(crate) fn path_starts_with(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    }
}
