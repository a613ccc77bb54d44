//! Error types shared by the plan persistence crates.

use thiserror::Error;

use crate::plans::PlanValidationError;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for plan session operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Validation(#[from] PlanValidationError),

    /// Entropy source unavailable while minting a token.
    #[error("Token error: {0}")]
    Token(String),

    /// No usable token was presented, or it resolves to no record.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not offered by this plan family.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Storage-layer failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection pool error: {0}")]
    PoolCreationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Storage operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl Error {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// True when the caller may retry the same request after a backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(db) => db.is_retryable(),
            _ => false,
        }
    }
}

impl DatabaseError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout(_) | Self::PoolCreationFailed(_)
        )
    }
}
