//! Common error types for the sync tooling

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library crates and the binary
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Playlist archive could not be fetched or read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Music catalog call failed in a way that ends the run
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the store rejected a write because of a UNIQUE constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!Error::Internal("UNIQUE constraint failed".to_string()).is_unique_violation());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Config("missing client id".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing client id");
    }
}
