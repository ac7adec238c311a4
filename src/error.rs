// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operation-level errors and their retry classification.
//!
//! Not-found is never an error: operations return `Ok(None)` for it.
//! Caller errors (authorization, validation, bad arguments or state) fail
//! immediately; storage failures are retried by
//! [`retry_classified`](crate::resilience::retry::retry_classified).

use thiserror::Error;

use crate::storage::traits::StorageError;

/// Classified kind of a failure, carried on retry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    Validation,
    InvalidArgument,
    InvalidState,
    Storage,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Storage)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Validation => "validation",
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidState => "invalid_state",
            Self::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for OperationError {
    fn from(e: StorageError) -> Self {
        match e {
            // A conflicting write fails the same way on every attempt
            StorageError::Conflict(msg) => OperationError::InvalidState(msg),
            other => OperationError::Storage(other),
        }
    }
}

impl OperationError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(OperationError::Storage(StorageError::Backend("x".into())).is_retryable());
        assert!(!OperationError::Unauthorized("x".into()).is_retryable());
        assert!(!OperationError::Validation("x".into()).is_retryable());
        assert!(!OperationError::InvalidArgument("x".into()).is_retryable());
        assert!(!OperationError::InvalidState("x".into()).is_retryable());
    }

    #[test]
    fn test_storage_error_converts_transparently() {
        let err: OperationError = StorageError::Backend("timeout".into()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "Storage backend error: timeout");
    }

    #[test]
    fn test_conflict_is_not_retryable() {
        let err: OperationError = StorageError::Conflict("duplicate id 'X'".into()).into();
        assert_eq!(err, OperationError::InvalidState("duplicate id 'X'".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "invalid_argument");
        assert_eq!(ErrorKind::Storage.to_string(), "storage");
    }
}
