//! Error types shared across the readmission workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, ReadmitError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum ReadmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
