//! Core domain types for the cexscan arbitrage heatmap.
//!
//! This crate provides:
//! - `TradingPair`, `License`, `UserSettings` and related value types
//! - Wire-format normalization for MongoDB extended-JSON payloads
//! - The filter/sort pipeline (`FilterCriteria`, `SortCriteria`, `apply`)
//! - Heat classes and display label formatting

pub mod error;
pub mod filter;
pub mod format;
pub mod license;
pub mod pair;
pub mod settings;
pub mod wire;

pub use error::{CoreError, Result};
pub use filter::{apply, filter_pairs, sort_pairs, FilterCriteria, Range, TagKind};
pub use format::HeatClass;
pub use license::{has_access, Access, License, LicenseChange};
pub use pair::{annotate_pinned, PinnedPair, ReferenceItem, TradingPair};
pub use settings::{SortCriteria, SortField, SortOrder, UserSettings, ViewMode};
pub use wire::normalize;
