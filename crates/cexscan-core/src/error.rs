//! Error types for cexscan-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid range: min {min} > max {max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("Unknown view mode: {0}")]
    UnknownViewMode(String),

    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("Unknown sort order: {0}")]
    UnknownSortOrder(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
