//! Error types for the query dispatcher.

use thiserror::Error;

/// The main error type for dispatcher operations.
///
/// Per-record problems (unparseable amounts, void conditions, malformed
/// pagination fields) never surface here; they are classified into fallback
/// buckets or defaults. Only whole-input and environment failures do.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Configuration file missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Numeric ranges that are empty, overlapping, gapped or not open-ended.
    #[error("Invalid ranges: {0}")]
    InvalidRanges(String),

    /// A `conditions` payload whose top level is not a JSON array.
    #[error("Malformed conditions: {0}")]
    MalformedConditions(String),

    /// Network failure or unusable response reported by a search backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure while building SQL for a condition set.
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for dispatcher operations.
pub type QueryResult<T> = Result<T, QueryError>;
