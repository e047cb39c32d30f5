//! Common error types for the SlowMovie player

use thiserror::Error;

/// Common result type for SlowMovie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the player and its storage layer
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

    /// Video open or frame decode failure (recoverable; retried next tick)
    #[error("Video error: {0}")]
    Video(String),

    /// Display hardware failure (recoverable; does not gate cursor advance)
    #[error("Display error: {0}")]
    Display(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
