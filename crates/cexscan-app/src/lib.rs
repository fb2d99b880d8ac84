//! cexscan terminal client.
//!
//! Wires the crates together:
//! - Session bootstrap and license polling
//! - Pair fetching on a configurable interval
//! - Filter, sort and view commands read from stdin
//! - Frame rendering to stdout, settings persisted on change and on exit

pub mod app;
pub mod commands;
pub mod config;
pub mod error;

pub use app::{AppEvent, Application};
pub use commands::Command;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
