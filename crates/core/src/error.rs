//! Error model for the collaborators of the posting pipeline.

use thiserror::Error;

use crate::id::AccountId;

/// Result type returned by a posting service.
pub type PostingResult<T> = Result<T, PostingError>;

/// Failure to post accrued interest for a single account.
///
/// Always scoped to one account: a posting error never says anything about
/// the state of sibling accounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostingError {
    /// The account failed validation (e.g. closed, missing product settings).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated while computing the accrual.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The account no longer exists.
    #[error("account not found: {0}")]
    NotFound(AccountId),

    /// Concurrent modification of the account (e.g. optimistic lock failure).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PostingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Failure of an account source to produce a page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("account source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// A configuration value was missing or malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing parameter: {0}")]
    Missing(String),

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing(key.into())
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
