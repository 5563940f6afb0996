use std::sync::Arc;

use thiserror::Error;

use crate::backend::BackendError;
use crate::value::SetError;
use crate::wire::WireError;

/// Synchronous argument and protocol failures.
///
/// These surface before any backend contact and are never retried.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("expected table name to be a non-empty string")]
    EmptyTableName,
    #[error("expected key to be a non-empty string")]
    EmptyKey,
    #[error("expected field to be a non-empty string")]
    EmptyField,
    #[error("expected value to be a string or a number")]
    ExpectedStringOrNumber,
    #[error("expected at least one element")]
    NoElements,
    #[error("expected index to be non-negative")]
    NegativeIndex,
    #[error("expected at most {max} elements, got {got}")]
    TooManyElements { max: usize, got: usize },
    #[error("EX / EXAT are exclusive")]
    ExclusiveExpiry,
    #[error("NX / XX are exclusive")]
    ExclusiveExistence,
    #[error("a transaction holds at most {max} commands, got {got}")]
    TransactionTooLarge { max: usize, got: usize },
    #[error("a transaction may not mix read operations with write operations")]
    MixedTransaction,
    #[error("command submitted more than one storage operation")]
    DuplicateSubmit,
    #[error("command finished without submitting a storage operation")]
    MissingSubmit,
}

/// The shared failure of one transaction batch.
///
/// Every participant of a failed transaction is rejected with a clone
/// of the same error, so no partial completion is ever observable.
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    #[error("transaction failed: {0}")]
    Backend(Arc<BackendError>),
    #[error("transaction aborted: {0}")]
    Aborted(&'static str),
}

/// Everything that can go wrong inside one command invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Set(#[from] SetError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("expected {key} to hold a {expected} value")]
    WrongType { key: String, expected: &'static str },
    #[error("no such key {key}")]
    NoSuchKey { key: String },
}

impl CommandError {
    /// True for the backend outcome some commands treat as a no-op.
    pub fn is_conditional_failure(&self) -> bool {
        matches!(
            self,
            CommandError::Backend(backend) if backend.is_conditional_check_failed()
        )
    }
}

/// A command failure, tagged with the library identity and the name of
/// the originating command so multi-command failures stay diagnosable.
///
/// The cause is wrapped structurally rather than by rewriting its
/// message.
#[derive(Error, Debug)]
#[error("[{}][{command}]: {source}", crate::PKG_NAME)]
pub struct Error {
    pub command: &'static str,
    #[source]
    pub source: CommandError,
}

impl Error {
    pub(crate) fn new(command: &'static str, source: CommandError) -> Self {
        Error { command, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_prefixed_with_library_and_command() {
        let err = Error::new("GET", ValidationError::EmptyKey.into());
        assert_eq!(
            err.to_string(),
            "[redtable][GET]: expected key to be a non-empty string"
        );
    }

    #[test]
    fn test_conditional_failure_detection() {
        let err: CommandError =
            BackendError::ConditionalCheckFailed("the condition failed".to_string()).into();
        assert!(err.is_conditional_failure());

        let err: CommandError = BackendError::Service("oops".to_string()).into();
        assert!(!err.is_conditional_failure());
    }
}
