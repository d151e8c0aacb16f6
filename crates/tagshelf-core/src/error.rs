//! Library error handling
//!
//! Every fallible core operation returns [`LibraryError`]. Constraint
//! violations reported by SQLite are classified as [`LibraryError::Conflict`]
//! so callers can show a single actionable message.

use std::io;
use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during library operations
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Uniqueness or foreign-key violation; the change was rolled back
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Lookup by id or name found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller supplied an argument the operation cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A field kind the library does not know how to handle
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Storage file or library directory unreachable
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation attempted while no library is open
    #[error("No library is open")]
    Closed,

    /// SQLite error that is not a constraint violation
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// Preference value could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for LibraryError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                LibraryError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => LibraryError::Database(error),
        }
    }
}

impl LibraryError {
    /// Create an error from an I/O error with path context
    pub fn from_io(error: io::Error, path: impl Into<PathBuf>) -> Self {
        LibraryError::Io {
            path: path.into(),
            source: error,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LibraryError::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        LibraryError::InvalidArgument(what.into())
    }

    /// Check if this error is a rejected uniqueness/FK change
    pub fn is_conflict(&self) -> bool {
        matches!(self, LibraryError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LibraryError::NotFound(_))
    }
}

/// Result type for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;
