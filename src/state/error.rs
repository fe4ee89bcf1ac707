/// Persistence error types.
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing review progress.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite rejected a statement or could not be opened.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to encode or decode stored JSON.
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to prepare the database location.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No data directory could be determined for the default database.
    #[error("could not determine user data directory")]
    NoDataDir,

    /// Another thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;

impl PersistError {
    /// Create an IO error with the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
