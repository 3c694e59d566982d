//! Domain error model.

use thiserror::Error;

use crate::id::PostingId;

/// Result type used across the logistics core.
pub type LogisticsResult<T> = Result<T, LogisticsError>;

/// Logistics-level error.
///
/// Only `ConsistencyViolation`/`DuplicatePostingId` indicate a bug; the rest are
/// ordinary outcomes of a busy world and callers are expected to retry later or
/// pick different work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogisticsError {
    /// Posting/record coherence was broken. The operation was aborted.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// A posting id was registered twice within one persistence scope.
    #[error("posting id {0} already exists in this registry")]
    DuplicatePostingId(PostingId),

    /// No destination or capacity is available right now.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// A claim was lost or could not be taken.
    #[error("contention: {0}")]
    Contention(String),

    /// A carried item had nowhere to go and was destroyed.
    #[error("last-resort failure: {0}")]
    LastResortFailure(String),

    /// A user-supplied value failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested posting, record or item was not found.
    #[error("not found")]
    NotFound,
}

impl LogisticsError {
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::ConsistencyViolation(msg.into())
    }

    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::Infeasible(msg.into())
    }

    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    pub fn last_resort(msg: impl Into<String>) -> Self {
        Self::LastResortFailure(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether a later scheduling pass may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infeasible(_) | Self::Contention(_))
    }

    /// Whether this error signals broken internal bookkeeping.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Self::ConsistencyViolation(_) | Self::DuplicatePostingId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(LogisticsError::infeasible("no room").is_transient());
        assert!(LogisticsError::contention("claimed").is_transient());
        assert!(!LogisticsError::validation("bad").is_transient());
        assert!(!LogisticsError::last_resort("gone").is_transient());
    }

    #[test]
    fn duplicate_id_counts_as_consistency_violation() {
        let err = LogisticsError::DuplicatePostingId(PostingId::new(4));
        assert!(err.is_consistency_violation());
        assert_eq!(err.to_string(), "posting id 4 already exists in this registry");
    }
}
