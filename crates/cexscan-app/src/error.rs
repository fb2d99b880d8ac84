//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid command: {0}")]
    Command(String),

    #[error("API error: {0}")]
    Api(#[from] cexscan_api::ApiError),

    #[error("Session error: {0}")]
    Session(#[from] cexscan_session::SessionError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] cexscan_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] cexscan_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
