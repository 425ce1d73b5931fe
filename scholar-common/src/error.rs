//! Common error types for Scholar

use thiserror::Error;

/// Common result type for Scholar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Scholar services
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

    /// Entity or slug does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or missing required input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Authenticated, but not the owner (or lacking the required role)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state (duplicate, capacity, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No or invalid session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for building a validation error from anything displayable
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Shorthand for building a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON (de)serialization failed: {}", err))
    }
}
