//! Dashboard error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Invalid dashboard config: {0}")]
    InvalidConfig(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
