//! Error types for bizdir-agg
//!
//! - `ValidationError`: one rejected record at the ingest boundary; never aborts a run
//! - `AdapterError`: a provider failure, isolated to that provider's crawl
//! - `AggError`: service-level failures (persistence, export, task plumbing)

use thiserror::Error;

/// Record rejected at the ingest boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Record has an empty name")]
    MissingName,

    #[error("Record '{name}' has an empty address")]
    MissingAddress { name: String },

    #[error("Record '{name}' has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        name: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("Record '{name}' has a non-finite rating")]
    InvalidRating { name: String },
}

/// Provider adapter failure
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network request failed (connect, timeout, TLS)
    #[error("{provider}: request failed: {message}")]
    Network { provider: String, message: String },

    /// Provider answered with a non-success status
    #[error("{provider}: API returned status {status}")]
    Status { provider: String, status: u16 },

    /// Payload could not be decoded
    #[error("{provider}: failed to parse response: {message}")]
    Parse { provider: String, message: String },

    /// The ingest service stopped before the crawl finished
    #[error("Ingest channel closed")]
    IngestClosed,
}

impl AdapterError {
    pub fn network(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub fn parse(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Error from the ingest handle
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Ingest channel closed")]
    Closed,
}

/// Service-level error
#[derive(Debug, Error)]
pub enum AggError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ingest task failed: {0}")]
    IngestTask(String),
}

/// Result type for service operations
pub type AggResult<T> = Result<T, AggError>;
