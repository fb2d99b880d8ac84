//! Prometheus metrics and structured logging for cexscan.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise),
//!   written to stderr so rendered frames own stdout
//! - Prometheus counters for HTTP attempts, endpoint cooldowns, license
//!   checks and renders

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
