//! Error types for character-device access

use thiserror::Error;

/// Character-device specific errors
#[derive(Debug, Error)]
pub enum CharDevError {
    /// Device node does not exist
    #[error("Device node {0} does not exist")]
    NotFound(String),

    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A driver control request failed
    #[error("{request} ioctl failed: {source}")]
    IoctlFailed {
        request: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Seek/read/write failed
    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] std::io::Error),
}

impl From<CharDevError> for synadiag_core::Error {
    fn from(e: CharDevError) -> Self {
        match e {
            CharDevError::NotFound(path) => synadiag_core::Error::DeviceNotFound(path),
            CharDevError::OpenFailed { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                synadiag_core::Error::DeviceNotFound(source.to_string())
            }
            CharDevError::OpenFailed { source, .. } => synadiag_core::Error::Io(source),
            CharDevError::IoctlFailed { source, .. } => synadiag_core::Error::Io(source),
            CharDevError::TransferFailed(source) => synadiag_core::Error::Io(source),
        }
    }
}

/// Result type for character-device operations
pub type Result<T> = std::result::Result<T, CharDevError>;
