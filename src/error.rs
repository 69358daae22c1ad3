//! Unified error handling for the activity core.
//!
//! Only transport, decode and storage failures surface as errors. Malformed
//! input coming from devices or persisted legacy data is degraded to empty or
//! default values by the individual modules instead.

use thiserror::Error;

/// Unified error type for activity-core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    /// The activity file endpoint answered with a non-2xx status
    #[error("Download failed ({status}): {status_text}")]
    DownloadFailed { status: u16, status_text: String },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("Request error: {message}")]
    Request { message: String },

    /// The binary activity file could not be decoded
    #[error("Decode failed: {message}")]
    DecodeFailed { message: String },

    /// Persistence/storage error
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl IngestError {
    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            IngestError::DownloadFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        IngestError::Storage {
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        IngestError::DecodeFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for activity-core operations.
pub type Result<T> = std::result::Result<T, IngestError>;
