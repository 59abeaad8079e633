//! Error types for the partsync core library.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the partsync library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source part set does not form a valid tiling of its files
    #[error("Invalid part set: {0}")]
    InvalidPartSet(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Part download failed or transferred a wrong byte count
    #[error("Download error: {0}")]
    Download(String),

    /// Local write or fsync failed
    #[error("Write error: {0}")]
    Write(String),

    /// Local delete failed
    #[error("Delete error: {0}")]
    Delete(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid object key or path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(format!("serialization error: {}", err))
    }
}
