//! API error types.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single transport attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Response body is not JSON: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Endpoint {endpoint} cooling down, retry in {retry_in:?}")]
    CoolingDown { endpoint: String, retry_in: Duration },

    #[error("Request to {endpoint} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ApiError {
    /// No network attempt was made because of an endpoint cooldown.
    pub fn is_cooling_down(&self) -> bool {
        matches!(self, ApiError::CoolingDown { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
