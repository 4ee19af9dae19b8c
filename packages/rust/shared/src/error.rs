//! Error types for dxtscout.
//!
//! Library crates use [`DxtScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Expected lookup results (a missing file, a throttled request) are not errors;
//! they travel as outcome enums in the discovery crate.

use std::path::PathBuf;

/// Top-level error type for all dxtscout operations.
#[derive(Debug, thiserror::Error)]
pub enum DxtScoutError {
    /// Missing credentials or an unreadable config file. Fatal at startup.
    #[error("config error: {message}")]
    Config { message: String },

    /// Connection, timeout, or HTTP client construction failure.
    #[error("network error: {0}")]
    Network(String),

    /// A fetched document is not a usable manifest (decode or marker failure).
    #[error("malformed manifest: {message}")]
    Manifest { message: String },

    /// The record store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad repository identifier, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DxtScoutError>;

impl DxtScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-manifest error from any displayable message.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort the process rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DxtScoutError::config("GITHUB_TOKEN is not set");
        assert_eq!(err.to_string(), "config error: GITHUB_TOKEN is not set");

        let err = DxtScoutError::manifest("missing dxt_version");
        assert!(err.to_string().contains("dxt_version"));
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(DxtScoutError::config("x").is_fatal());
        assert!(!DxtScoutError::Storage("locked".into()).is_fatal());
        assert!(!DxtScoutError::Network("timeout".into()).is_fatal());
    }
}
