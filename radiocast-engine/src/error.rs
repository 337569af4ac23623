//! Error types for radiocast-engine
//!
//! Every failure of an external collaborator is converted into one of these
//! kinds at the call site. Only `Cancelled` is meant to unwind a sequence task.

use thiserror::Error;

/// Main error type for radiocast-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog fetch exceeded its time bound
    #[error("Catalog fetch timed out after {0:?}")]
    DataSourceTimeout(std::time::Duration),

    /// Catalog collaborator failed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Narration asset could not be resolved
    #[error("Narration asset missing: {bucket}/{key}")]
    AssetMissing { bucket: String, key: String },

    /// External renderer refused or failed playback
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Cooperative cancellation observed
    #[error("Sequence cancelled")]
    Cancelled,

    /// Device control errors
    #[error("Device error: {0}")]
    Device(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<radiocast_common::Error> for Error {
    fn from(err: radiocast_common::Error) -> Self {
        match err {
            radiocast_common::Error::Io(e) => Error::Io(e),
            radiocast_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

/// Convenience Result type using radiocast-engine Error
pub type Result<T> = std::result::Result<T, Error>;
