//! Error types for ht-types.

use thiserror::Error;

/// Errors raised while parsing or validating domain values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The key does not name an entry in the preset table.
    #[error("Unknown data period: '{0}'")]
    UnknownPeriod(String),

    /// An ingested reading failed validation.
    #[error("Invalid reading: {0}")]
    InvalidReading(String),
}

/// Result type alias using ht-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
