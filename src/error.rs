//! Error types for meetspot.

use thiserror::Error;

/// Errors returned by the index, the record store and the query planner.
#[derive(Debug, Error)]
pub enum MeetspotError {
    /// An entity with this id is already indexed; delete it first.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// The id is not present in the index or the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// The index references an entity the store does not hold.
    #[error("index/store consistency violation: {0}")]
    Consistency(String),

    /// Input rejected at the boundary (coordinates, distances, time windows).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Geohash encoding failed.
    #[error("invalid geohash: {0}")]
    InvalidGeohash(String),

    /// A persisted file has an unexpected layout.
    #[error("invalid data format")]
    InvalidFormat,

    /// Serialization error with context.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the snapshot layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeetspotError {
    /// Short, stable name of the error kind, for logs and remote callers.
    pub fn kind(&self) -> &'static str {
        match self {
            MeetspotError::DuplicateId(_) => "duplicate_id",
            MeetspotError::NotFound(_) => "not_found",
            MeetspotError::Consistency(_) => "consistency",
            MeetspotError::InvalidInput(_) => "invalid_input",
            MeetspotError::InvalidGeohash(_) => "invalid_geohash",
            MeetspotError::InvalidFormat => "invalid_format",
            MeetspotError::Serialization(_) => "serialization",
            MeetspotError::Io(_) => "io",
        }
    }
}

impl From<geohash::GeohashError> for MeetspotError {
    fn from(err: geohash::GeohashError) -> Self {
        MeetspotError::InvalidGeohash(err.to_string())
    }
}

impl From<serde_json::Error> for MeetspotError {
    fn from(err: serde_json::Error) -> Self {
        MeetspotError::Serialization(err.to_string())
    }
}

/// Result type alias for meetspot operations.
pub type Result<T> = std::result::Result<T, MeetspotError>;
