//! Error types for cache operations.

use thiserror::Error;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database connection or statement failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty or longer than the allowed 256 code points.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The record type reports an empty schema version tag.
    #[error("Record type has an empty schema version")]
    MissingSchemaVersion,

    /// The cache has been closed; no further operations are possible.
    #[error("Cache is closed")]
    Closed,

    /// Filesystem error while preparing the store path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
