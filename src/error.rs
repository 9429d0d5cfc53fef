//! Centralized error types for docpreview.

use std::path::PathBuf;
use thiserror::Error;

use crate::preview::classify::RemoteError;

/// All errors produced by the docpreview library.
///
/// Parsing and decoding never produce these: malformed input degrades to a
/// fallback value instead. Errors only come from collaborators and payload
/// materialization.
#[derive(Error, Debug)]
pub enum PreviewError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested file does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// A remote collaborator reported a failure.
    #[error("{0}")]
    Remote(RemoteError),

    /// Converting a mail container to `{html, attachments}` failed.
    #[error("Unable to convert {format} file: {reason}")]
    Conversion { format: String, reason: String },

    /// The fetched payload could not be decoded to bytes.
    #[error("Invalid file payload: {0}")]
    InvalidPayload(String),

    /// Configuration could not be loaded or applied.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, PreviewError>`.
pub type Result<T> = std::result::Result<T, PreviewError>;

impl PreviewError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `Conversion` error for the given format label.
    pub fn conversion(format: &str, reason: impl std::fmt::Display) -> Self {
        Self::Conversion {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<RemoteError> for PreviewError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}
