//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
///
/// Record-level errors ([`Error::MalformedRecord`], [`Error::EntityResolution`])
/// are contained by the driver; everything else aborts the current shard and
/// is surfaced to the caller after the shard's partial batch is committed.
#[derive(Error, Debug)]
pub enum Error {
    /// Shard fetch failed, the server returned an error status, or the
    /// connection failed while the body was being read.
    #[error("transport error fetching {shard}: {reason}")]
    Transport {
        /// Shard identifier (URL or path).
        shard: String,
        /// What went wrong.
        reason: String,
    },

    /// Shard byte stream is truncated or not valid gzip.
    #[error("decompression error in {shard}: {source}")]
    Decompression {
        /// Shard identifier (URL or path).
        shard: String,
        /// Underlying read error from the decoder.
        #[source]
        source: std::io::Error,
    },

    /// A single line does not decode into the expected record shape.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The entity resolver rejected an actor or repository fragment.
    #[error("entity resolution failed: {0}")]
    EntityResolution(String),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is isolated to a single record.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::MalformedRecord(_) | Self::EntityResolution(_))
    }
}

impl From<osrc_core::Error> for Error {
    fn from(e: osrc_core::Error) -> Self {
        Self::MalformedRecord(e.to_string())
    }
}
