//! Error types for the core records

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for record operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while reading, writing or inspecting records
#[derive(Debug, Error)]
pub enum CoreError {
    /// Reading or writing a record file failed
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The record could not be encoded or decoded
    #[error("Invalid record: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither `uuid` nor `id` is present in the job descriptor
    #[error("No identifier for the job")]
    MissingIdentifier,

    /// A status string outside the closed enumeration
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

impl CoreError {
    /// Create an IO error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
