/*!
Common error types for the spisnif components.
*/

use std::collections::TryReserveError;
use thiserror::Error;

/// Common result type used throughout the shared library
pub type Result<T> = std::result::Result<T, SharedError>;

#[derive(Error, Debug)]
pub enum SharedError {
    /// I/O errors (device nodes, mapping, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A frame buffer could not be obtained; the session was dropped
    #[error("Allocation failure: {0}")]
    Allocation(String),

    /// Value out of range for a device field
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bad register map or window layout
    #[error("Configuration error: {0}")]
    Config(String),

    /// The interrupt source hung up
    #[error("Notification source closed")]
    NotifierClosed,
}

impl SharedError {
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<TryReserveError> for SharedError {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}
