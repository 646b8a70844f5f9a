//! Public error model for ledger operations.
//!
//! Every failure surfaced by a service carries one of three business kinds
//! (not found, conflict, validation) plus a human-readable message. Storage
//! faults are kept separate so callers can tell a bad request from a broken
//! database.

use crate::repo::RepoError;
use thiserror::Error;

/// Result type returned by service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification used by transport layers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Storage,
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced user, household, member, bill or bill item does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The request is well-formed but contradicts current state.
    #[error("{0}")]
    Conflict(String),
    /// The request is malformed or out of range.
    #[error("{0}")]
    Validation(String),
    /// The store failed underneath the operation.
    #[error("storage failure: {0}")]
    Storage(#[source] RepoError),
}

impl CoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Short stable code for `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(message) => Self::NotFound(message),
            RepoError::Conflict(message) => Self::Conflict(message),
            RepoError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, ErrorKind};
    use crate::repo::RepoError;

    #[test]
    fn repo_business_errors_keep_their_kind() {
        let err = CoreError::from(RepoError::Conflict("bill item already paid".to_string()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "bill item already paid");

        let err = CoreError::from(RepoError::NotFound("bill not found: x".to_string()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_rows_surface_as_storage() {
        let err = CoreError::from(RepoError::InvalidData("bad uuid".to_string()));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.code(), "storage");
    }
}
