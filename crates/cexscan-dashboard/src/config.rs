//! Dashboard configuration.

use cexscan_core::ViewMode;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{DashboardError, DashboardResult};

/// Dashboard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// View shown before saved settings are applied.
    #[serde(default)]
    pub default_view: ViewMode,

    /// Data poll interval in seconds (0 = polling disabled).
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Age label refresh period in milliseconds.
    #[serde(default = "default_label_tick_ms")]
    pub label_tick_ms: u64,

    /// Terminal width in columns.
    #[serde(default = "default_display_width")]
    pub display_width: usize,

    /// Narrowest display that still offers the list view.
    #[serde(default = "default_list_min_width")]
    pub list_min_width: usize,

    /// Number of leading treemap tiles drawn at double width.
    #[serde(default = "default_emphasized_tiles")]
    pub emphasized_tiles: usize,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_label_tick_ms() -> u64 {
    1000
}

fn default_display_width() -> usize {
    120
}

fn default_list_min_width() -> usize {
    100
}

fn default_emphasized_tiles() -> usize {
    5
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_view: ViewMode::default(),
            default_interval_secs: default_interval_secs(),
            label_tick_ms: default_label_tick_ms(),
            display_width: default_display_width(),
            list_min_width: default_list_min_width(),
            emphasized_tiles: default_emphasized_tiles(),
        }
    }
}

impl DashboardConfig {
    pub fn label_tick(&self) -> Duration {
        Duration::from_millis(self.label_tick_ms)
    }

    pub fn validate(&self) -> DashboardResult<()> {
        if self.label_tick_ms == 0 {
            return Err(DashboardError::InvalidConfig(
                "label_tick_ms must be positive".to_string(),
            ));
        }
        if self.display_width < 40 {
            return Err(DashboardError::InvalidConfig(format!(
                "display_width {} is below 40 columns",
                self.display_width
            )));
        }
        Ok(())
    }
}
