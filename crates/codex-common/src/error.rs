//! Common error types used throughout codex.
//!
//! [`Error`] carries the detail of a failure; [`ErrorKind`] is the coarse
//! classification that travels inside job results and decides how a failure
//! is handled (logged and degraded, or silently dropped).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure inside the enrichment subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A gateway call failed (network, non-2xx status, malformed payload).
    RemoteLookupFailed,
    /// A cache read, write, or eviction failed.
    IoFailure,
    /// A result arrived for a scan pass that has since been replaced.
    StaleResult,
    /// Configuration could not be read, parsed, or written.
    Config,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteLookupFailed => write!(f, "remote_lookup_failed"),
            Self::IoFailure => write!(f, "io_failure"),
            Self::StaleResult => write!(f, "stale_result"),
            Self::Config => write!(f, "config"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Common error type for codex.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote catalog call failed.
    #[error("Remote lookup failed [{operation}]: {message}")]
    RemoteLookup {
        /// The gateway operation that failed (e.g. "find_show").
        operation: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A result was tagged with a generation other than the current one.
    #[error("Stale result: expected generation {expected}, got {actual}")]
    StaleResult {
        /// The generation currently being enriched.
        expected: u64,
        /// The generation the result was produced for.
        actual: u64,
    },

    /// Configuration problem.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new RemoteLookup error.
    pub fn remote_lookup(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::RemoteLookup {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteLookup { .. } => ErrorKind::RemoteLookupFailed,
            Self::Io(_) => ErrorKind::IoFailure,
            Self::StaleResult { .. } => ErrorKind::StaleResult,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidInput(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
