//! User-chosen view, sort and filter settings.
//!
//! `UserSettings` mirrors the settings document stored by the backend. Every
//! field is optional because the server returns whatever was last written;
//! keys this client does not know about are kept in `extra` and sent back
//! untouched on the next write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Dashboard view mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Treemap,
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Treemap => "treemap",
            Self::Grid => "grid",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treemap" => Ok(Self::Treemap),
            "grid" => Ok(Self::Grid),
            "list" => Ok(Self::List),
            other => Err(CoreError::UnknownViewMode(other.to_string())),
        }
    }
}

/// Field to order pairs by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Coin,
    Network,
    #[default]
    Spread,
    /// Derived: volume × spread / 100.
    Profit,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Network => "network",
            Self::Spread => "spread",
            Self::Profit => "profit",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coin" => Ok(Self::Coin),
            "network" => Ok(Self::Network),
            "spread" => Ok(Self::Spread),
            "profit" => Ok(Self::Profit),
            other => Err(CoreError::UnknownSortField(other.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(CoreError::UnknownSortOrder(other.to_string())),
        }
    }
}

/// Sort field and direction. Defaults to spread, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortCriteria {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortCriteria {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Persisted settings document.
///
/// Also used as a patch: `merged_with` overlays every `Some` field of the
/// patch onto `self`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_coins: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_buy_exchanges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_sell_exchanges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<ViewMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    /// Poll interval in seconds (0 = polling disabled).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_max: Option<f64>,
    /// Minimum freshness age in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<f64>,
    /// Maximum freshness age in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<f64>,
    /// Keys this client does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserSettings {
    /// Decode a settings document, tolerating a missing or non-object value.
    ///
    /// Fields with an unexpected type are dropped individually instead of
    /// discarding the whole document.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        if let Ok(settings) = serde_json::from_value::<Self>(Value::Object(map.clone())) {
            return settings;
        }
        let known = [
            "selected_coins",
            "selected_buy_exchanges",
            "selected_sell_exchanges",
            "view_mode",
            "sort_field",
            "sort_order",
            "update_interval",
            "spread_min",
            "spread_max",
            "volume_min",
            "volume_max",
            "time_min",
            "time_max",
        ];
        for key in known {
            if let Some(field) = map.get(key) {
                let probe = Value::Object(Map::from_iter([(key.to_string(), field.clone())]));
                if serde_json::from_value::<Self>(probe).is_err() {
                    tracing::warn!(key, value = %field, "Dropping malformed settings field");
                    map.remove(key);
                }
            }
        }
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }

    /// Overlay every field set in `patch` onto a copy of `self`.
    pub fn merged_with(&self, patch: &UserSettings) -> UserSettings {
        let mut merged = self.clone();
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(
                    if patch.$field.is_some() {
                        merged.$field = patch.$field.clone();
                    }
                )*
            };
        }
        overlay!(
            selected_coins,
            selected_buy_exchanges,
            selected_sell_exchanges,
            view_mode,
            sort_field,
            sort_order,
            update_interval,
            spread_min,
            spread_max,
            volume_min,
            volume_max,
            time_min,
            time_max
        );
        for (key, value) in &patch.extra {
            merged.extra.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Sort criteria if both halves are stored.
    pub fn sort(&self) -> Option<SortCriteria> {
        match (self.sort_field, self.sort_order) {
            (Some(field), Some(order)) => Some(SortCriteria::new(field, order)),
            _ => None,
        }
    }
}
