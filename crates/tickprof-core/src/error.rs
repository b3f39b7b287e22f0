//! Error types for the profiler.

use thiserror::Error;

/// Profiler-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The configured mode is not one of OFF, TIMING or TRACE.
    #[error("Unknown profiler mode '{0}'")]
    UnknownMode(String),

    /// An activation link was requested but no shared secret is configured.
    #[error("The environment variable 'PROFILER_WEB_KEY' is required to sign or verify activation links")]
    MissingSecret,

    /// A URL could not be parsed.
    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl {
        /// The offending input.
        url: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A configuration value could not be interpreted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::MalformedUrl`] for `url`.
    #[must_use]
    pub fn malformed_url(url: &str, reason: &'static str) -> Self {
        Self::MalformedUrl {
            url: url.to_string(),
            reason,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
