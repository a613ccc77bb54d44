//! Storage errors and their mapping onto the core taxonomy.

use pocketplan_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn is_busy(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("database is locked") || lower.contains("database is busy")
}

impl From<StorageError> for DatabaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(diesel::result::Error::DatabaseError(_, info))
                if is_busy(info.message()) =>
            {
                DatabaseError::ConnectionFailed(info.message().to_string())
            }
            StorageError::Query(e) => DatabaseError::QueryFailed(e.to_string()),
            StorageError::Connection(e) => DatabaseError::ConnectionFailed(e.to_string()),
            StorageError::Pool(e) => DatabaseError::ConnectionFailed(e.to_string()),
            StorageError::Migration(message) => DatabaseError::MigrationFailed(message),
            StorageError::Io(e) => DatabaseError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_permanent_query_failure() {
        let err: Error = StorageError::from(diesel::result::Error::NotFound).into();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::QueryFailed(_))
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_errors_are_retryable() {
        let err: Error =
            StorageError::from(diesel::ConnectionError::BadConnection("gone".into())).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn busy_detection_matches_sqlite_messages() {
        assert!(is_busy("database is locked"));
        assert!(is_busy("Database is BUSY"));
        assert!(!is_busy("no such table: plan_sessions"));
    }
}
