//! Shared primitives for all Rust crates in Grantshift.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Grantshift crates.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// A validated grant display name as configured by the operator.
///
/// Deserialization runs the same validation as [`GrantName::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct GrantName(String);

impl GrantName {
    /// Creates a validated grant name.
    pub fn new(value: impl Into<String>) -> MigrationResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(MigrationError::Validation(
                "grant name must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for GrantName {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GrantName> for String {
    fn from(value: GrantName) -> Self {
        value.0
    }
}

impl std::fmt::Display for GrantName {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Error categories raised during a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Exact-name resolution failed for the source or target grant.
    /// Fatal; aborts before any mutation.
    #[error("grant not found: no grant definition named '{0}'")]
    GrantNotFound(String),

    /// Rollback was requested but no persisted migration record exists.
    /// Fatal; aborts before any directory call.
    #[error("no prior migration: nothing to roll back")]
    NoPriorMigration,

    /// The grant directory could not be reached or refused service
    /// (network failure, auth rejection, throttling, server error).
    /// Fatal for the remainder of the run.
    #[error("grant directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The grant directory rejected a single request. Recoverable when it
    /// occurs inside per-principal execution.
    #[error("grant directory rejected request: {0}")]
    DirectoryRejected(String),

    /// The migration log could not be read or written. After a live run
    /// this means changes were made that cannot be rolled back
    /// automatically.
    #[error("state persistence failure: {0}")]
    StatePersistence(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
