//! Error types for fleet execution.
//!
//! Errors are categorized to drive the retry policy: connection-class
//! failures are transient and worth reattempting, while malformed
//! invocations and configuration mistakes surface immediately.

use thiserror::Error;

/// Categories of execution errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Could not reach the server (transient, retryable)
    Connection,
    /// An operation exceeded its time budget (transient, retryable)
    Timeout,
    /// Other transient failure, e.g. the transport died mid-command (retryable)
    Transient,
    /// Malformed invocation or explicitly non-retryable classification
    Invalid,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout | Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Connection failure",
            Self::Timeout => "Operation timed out",
            Self::Transient => "Transient failure",
            Self::Invalid => "Invalid invocation",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while executing commands against the fleet.
///
/// Ordinary command failure (a remote command exiting non-zero) is NOT an
/// error: the execution primitive reports it through
/// [`Execution::success`](crate::types::Execution). Only connection-class
/// problems and caller mistakes land here.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not establish or keep a connection to a server
    #[error("connection to {host} failed: {detail}")]
    Connection {
        /// Address of the unreachable server
        host: String,
        /// Transport-level detail from the failed attempt
        detail: String,
    },

    /// An operation exceeded its time budget
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Description of what timed out
        operation: String,
        /// The budget that was exceeded, in seconds
        seconds: u64,
    },

    /// Transient failure outside the connection/timeout classes
    #[error("transient failure: {detail}")]
    Transient {
        /// Description of the failure
        detail: String,
    },

    /// Malformed invocation
    #[error("invalid invocation: {detail}")]
    Invalid {
        /// What was wrong with the call
        detail: String,
    },

    /// Dispatch was configured with unusable options (e.g. zero workers)
    #[error("dispatch misconfigured: {detail}")]
    Options {
        /// Which option was unusable and why
        detail: String,
    },

    /// IO error (e.g. the local ssh client could not be spawned)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::Invalid { .. } | Error::Options { .. } => ErrorCategory::Invalid,
            Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for fleet operations.
pub type Result<T> = std::result::Result<T, Error>;
