//! Session error types.

use cexscan_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No user identity available")]
    NoIdentity,

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

pub type SessionResult<T> = Result<T, SessionError>;
