//! Error types for radiosync-server
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for radiosync-server
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request parameter
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] radiosync_common::Error),

    /// Unexpected failure while serving a request
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using radiosync-server Error
pub type Result<T> = std::result::Result<T, Error>;
