//! Error taxonomy for the token lifecycle.
//!
//! Three classes matter to the orchestrator:
//! - [`HandshakeError`]: fatal, nothing downstream is issued
//! - [`OperationError`]: local to one call, siblings keep running
//! - [`LifecycleError::PreconditionViolation`]: a broken contract, fatal

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tonic::{Code, Status};

use crate::config::ConfigError;

/// Identifies which post-handshake call an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Pre-revoke liveness check
    Introspect,
    /// Identity lookup
    UserInfo,
    /// Server-side invalidation
    Revoke,
    /// Post-revoke introspection
    ConfirmRevocation,
}

impl Operation {
    /// Stable name used in logs and summaries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Introspect => "introspect",
            Self::UserInfo => "user_info",
            Self::Revoke => "revoke",
            Self::ConfirmRevocation => "confirm_revocation",
        }
    }

    /// Whether a failure of this operation ends the run.
    ///
    /// Only Revoke is fatal; the other calls are reported and the run
    /// continues.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Revoke)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the Authenticate stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The Authenticate call was rejected before any message arrived
    #[error("authenticate call rejected ({code:?}): {message}")]
    Rejected {
        /// gRPC status code
        code: Code,
        /// Status message from the server
        message: String,
    },

    /// The stream terminated with an error after it was opened
    #[error("authenticate stream failed after {received} message(s) ({code:?}): {message}")]
    StreamFailed {
        /// Messages processed before the failure
        received: usize,
        /// gRPC status code
        code: Code,
        /// Status message from the server
        message: String,
    },

    /// The stream stayed open past the configured deadline
    #[error("authenticate stream did not close within {timeout:?}")]
    TimedOut {
        /// Configured handshake deadline
        timeout: Duration,
    },

    /// The driver was dropped before reaching a terminal state
    #[error("handshake abandoned before completion")]
    Abandoned,
}

impl HandshakeError {
    /// Builds a `Rejected` error from the status of the opening call.
    #[must_use]
    pub fn rejected(status: &Status) -> Self {
        Self::Rejected {
            code: status.code(),
            message: status.message().to_string(),
        }
    }

    /// Builds a `StreamFailed` error from a mid-stream status.
    #[must_use]
    pub fn stream_failed(received: usize, status: &Status) -> Self {
        Self::StreamFailed {
            received,
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Failure of a single Introspect, UserInfo or Revoke call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed ({code:?}): {message}")]
pub struct OperationError {
    /// The call that failed
    pub operation: Operation,
    /// gRPC status code
    pub code: Code,
    /// Status message from the server
    pub message: String,
}

impl OperationError {
    /// Wraps a gRPC status with the operation that produced it.
    #[must_use]
    pub fn from_status(operation: Operation, status: &Status) -> Self {
        Self {
            operation,
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Errors that end an orchestration run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Handshake failed; no dependent call was issued
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// A dependent call failed in a way that aborts the run
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Orchestration contract broken
    #[error("precondition violated: {reason}")]
    PreconditionViolation {
        /// What was attempted out of order
        reason: String,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gRPC endpoint could not be built
    #[error("transport error: {reason}")]
    Transport {
        /// Description of the transport failure
        reason: String,
    },
}

impl LifecycleError {
    /// Creates a `PreconditionViolation`.
    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            reason: reason.into(),
        }
    }

    /// The failed operation, when the error came from one.
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Self::Operation(err) => Some(err.operation),
            _ => None,
        }
    }

    /// True for handshake failures.
    #[must_use]
    pub const fn is_handshake(&self) -> bool {
        matches!(self, Self::Handshake(_))
    }
}

impl From<tonic::transport::Error> for LifecycleError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Transport {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_names_the_operation() {
        let status = Status::unavailable("connection refused");
        let err = OperationError::from_status(Operation::UserInfo, &status);

        assert_eq!(err.operation, Operation::UserInfo);
        assert_eq!(err.code, Code::Unavailable);
        let text = err.to_string();
        assert!(text.starts_with("user_info failed"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_handshake_error_carries_detail() {
        let status = Status::internal("Unexpected response from Identity Provider");
        let err = HandshakeError::stream_failed(2, &status);

        let text = err.to_string();
        assert!(text.contains("after 2 message(s)"));
        assert!(text.contains("Identity Provider"));
    }

    #[test]
    fn test_lifecycle_error_classification() {
        let err = LifecycleError::from(HandshakeError::Abandoned);
        assert!(err.is_handshake());
        assert_eq!(err.operation(), None);

        let err = LifecycleError::from(OperationError::from_status(
            Operation::Revoke,
            &Status::internal("boom"),
        ));
        assert!(!err.is_handshake());
        assert_eq!(err.operation(), Some(Operation::Revoke));
    }

    #[test]
    fn test_only_revoke_is_fatal() {
        assert!(Operation::Revoke.is_fatal());
        assert!(!Operation::Introspect.is_fatal());
        assert!(!Operation::UserInfo.is_fatal());
        assert!(!Operation::ConfirmRevocation.is_fatal());
    }

    #[test]
    fn test_operation_display_names_are_stable() {
        assert_eq!(Operation::Introspect.as_str(), "introspect");
        assert_eq!(Operation::ConfirmRevocation.to_string(), "confirm_revocation");
    }
}
