//! Common error types for rawi

use thiserror::Error;

/// Common result type for rawi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the rawi services
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

    /// Caller does not own the targeted resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation not allowed in the entity's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote file store or external catalog failure
    #[error("Remote error: {0}")]
    Remote(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
