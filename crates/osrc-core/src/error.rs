//! Error types for archive record handling.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding a single archive record.
#[derive(Error, Debug)]
pub enum Error {
    /// The record line is not valid JSON or does not have the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field is present but has an unusable value.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// The name of the invalid field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// The `created_at` value matched none of the known archive formats.
    #[error("unrecognized timestamp '{0}'")]
    InvalidTimestamp(String),
}
