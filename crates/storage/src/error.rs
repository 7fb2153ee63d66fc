use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    /// Unique or foreign-key constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{0} {1} not found")]
    NotFound(&'static str, i64),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if matches!(db.kind(), ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation) {
                return StorageError::Conflict(db.message().to_string());
            }
        }
        StorageError::Database(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Corrupt(e.to_string())
    }
}

impl From<rekon_core::CoreError> for StorageError {
    fn from(e: rekon_core::CoreError) -> Self {
        StorageError::Corrupt(e.to_string())
    }
}
