//! crates/redirect/src/config.rs
//! Redirection settings and their textual form.

use std::env;
use std::fmt;
use std::str::FromStr;

use logging::{ParseSeverityError, Severity};

use crate::channel::Channel;
use crate::exception::{ExceptionHandling, ParseExceptionHandlingError};

/// Environment variable read by [`RedirectConfig::from_env`].
pub const CONFIG_ENV: &str = "STDIO_REDIRECT";

/// Severities and trace handling applied to redirected output.
///
/// The textual form is a comma-separated list of `key=value` tokens:
///
/// ```
/// use redirect::{ExceptionHandling, RedirectConfig};
/// use logging::Severity;
///
/// let config: RedirectConfig = "stdout=debug,exceptions=single-record".parse().unwrap();
/// assert_eq!(config.primary, Severity::Debug);
/// assert_eq!(config.error, Severity::Warn);
/// assert_eq!(config.exceptions, ExceptionHandling::SingleRecord);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct RedirectConfig {
    /// Severity of ordinary lines written to the primary channel.
    pub primary: Severity,
    /// Severity of ordinary lines written to the error channel.
    pub error: Severity,
    /// How stack-trace lines are grouped.
    pub exceptions: ExceptionHandling,
    /// Severity of stack-trace records.
    pub exception_severity: Severity,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            primary: Severity::Info,
            error: Severity::Warn,
            exceptions: ExceptionHandling::PerLine,
            exception_severity: Severity::Error,
        }
    }
}

impl RedirectConfig {
    /// Severity of ordinary lines written to `channel`.
    #[must_use]
    pub const fn severity_for(&self, channel: Channel) -> Severity {
        match channel {
            Channel::Primary => self.primary,
            Channel::Error => self.error,
        }
    }

    /// Sets the severity of ordinary lines written to `channel`.
    #[must_use]
    pub const fn with_severity(mut self, channel: Channel, severity: Severity) -> Self {
        match channel {
            Channel::Primary => self.primary = severity,
            Channel::Error => self.error = severity,
        }
        self
    }

    /// Selects the trace grouping and its severity.
    #[must_use]
    pub const fn with_exceptions(
        mut self,
        handling: ExceptionHandling,
        severity: Severity,
    ) -> Self {
        self.exceptions = handling;
        self.exception_severity = severity;
        self
    }

    /// Reads [`CONFIG_ENV`], falling back to the defaults when it is unset
    /// or empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(CONFIG_ENV) {
            Ok(value) => value.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode),
        }
    }
}

/// Errors produced while parsing a [`RedirectConfig`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A token had no `=`.
    #[error("expected key=value, found '{0}'")]
    MissingValue(String),
    /// The key is not recognised.
    #[error("unknown redirect setting '{0}'")]
    UnknownKey(String),
    /// A severity value did not parse.
    #[error("invalid value for '{key}': {source}")]
    Severity {
        /// Key whose value was rejected.
        key: String,
        /// Underlying parse failure.
        #[source]
        source: ParseSeverityError,
    },
    /// An exception handling value did not parse.
    #[error(transparent)]
    Exceptions(#[from] ParseExceptionHandlingError),
    /// The environment variable held non-UTF-8 data.
    #[error("STDIO_REDIRECT is not valid unicode")]
    NotUnicode,
}

fn parse_severity(key: &str, value: &str) -> Result<Severity, ConfigError> {
    value.parse().map_err(|source| ConfigError::Severity {
        key: key.to_owned(),
        source,
    })
}

impl FromStr for RedirectConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Self::default();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ConfigError::MissingValue(token.to_owned()))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "stdout" | "primary" => config.primary = parse_severity(&key, value)?,
                "stderr" | "error" => config.error = parse_severity(&key, value)?,
                "exceptions" => config.exceptions = value.parse()?,
                "exception-level" | "exception_level" => {
                    config.exception_severity = parse_severity(&key, value)?;
                }
                _ => return Err(ConfigError::UnknownKey(key)),
            }
        }
        Ok(config)
    }
}

impl fmt::Display for RedirectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stdout={},stderr={},exceptions={},exception-level={}",
            self.primary, self.error, self.exceptions, self.exception_severity
        )
    }
}
