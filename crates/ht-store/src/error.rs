//! Error types for ht-store.

use std::path::PathBuf;

/// Result type for ht-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ht-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite, including busy timeouts.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Device not found in the registry.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A stored timestamp could not be represented.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
