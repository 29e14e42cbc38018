//! Error types for advancement progress tracking.
//!
//! A veto collaborator cancelling a grant or revoke is a normal outcome and
//! never shows up here; those operations return `None` instead. Errors are
//! reserved for misuse of the API (bad arguments, unknown criteria, illegal
//! state changes) and for the persistence and configuration layers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for progress operations.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// A value outside the accepted domain (score out of range, malformed
    /// criterion definition, score operation on a non-score criterion).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The criterion is not part of this advancement's tree.
    #[error("criterion not found: {name}")]
    NotFound { name: String },

    /// An operation that the node's current state forbids.
    #[error("illegal state: {message}")]
    IllegalState { message: String },

    /// I/O errors from the progress store or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },
}

/// A specialized Result type for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

impl ProgressError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not found error for a criterion name.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<io::Error> for ProgressError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Fail-open handling for infrastructure errors.
///
/// Store and config failures should not take a player's session down; the
/// caller logs a warning and continues with a fallback.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}
