//! View models handed from the render scheduler to the text renderers.

use cexscan_core::format::{age_label, time_remaining_label};
use cexscan_core::{Access, HeatClass, License, LicenseChange, SortCriteria, TradingPair, ViewMode};
use chrono::{DateTime, Utc};
use std::fmt;

use crate::store::Stats;

// ============================================================================
// Pairs
// ============================================================================

/// One visible pair, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PairView {
    pub id: String,
    pub coin_pair: String,
    pub network: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Spread, percent.
    pub spread: f64,
    pub heat: HeatClass,
    pub volume_usd: f64,
    pub profit_usd: f64,
    /// Kept so that age labels can be recomputed without the store.
    pub alive_time: Option<DateTime<Utc>>,
    /// `-` when the pair carries no alive time.
    pub age_label: String,
    pub pinned: bool,
    /// Column span: 2 for emphasized treemap tiles, else 1.
    pub span: u8,
}

impl PairView {
    pub fn new(pair: &TradingPair, span: u8, now: DateTime<Utc>) -> Self {
        Self {
            id: pair.id.clone(),
            coin_pair: pair.coin_pair.clone(),
            network: pair.network.clone(),
            buy_exchange: pair.buy_exchange.clone(),
            sell_exchange: pair.sell_exchange.clone(),
            buy_price: pair.buy_price,
            sell_price: pair.sell_price,
            spread: pair.spread,
            heat: HeatClass::from_spread(pair.spread),
            volume_usd: pair.available_volume_usd,
            profit_usd: pair.profit(),
            alive_time: pair.alive_time,
            age_label: label_for(pair.alive_time, now),
            pinned: pair.is_pinned,
            span,
        }
    }

    /// Recompute the age label. Returns true if it changed.
    pub fn refresh_age(&mut self, now: DateTime<Utc>) -> bool {
        let label = label_for(self.alive_time, now);
        if label == self.age_label {
            return false;
        }
        self.age_label = label;
        true
    }
}

fn label_for(alive_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match alive_time {
        Some(alive) => age_label((now - alive).num_milliseconds().div_euclid(1000)),
        None => "-".to_string(),
    }
}

// ============================================================================
// Header
// ============================================================================

/// License status as shown in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseBadge {
    pub label: String,
    pub expiring_soon: bool,
}

impl LicenseBadge {
    pub fn new(license: Option<&License>, now: DateTime<Utc>) -> Self {
        match license {
            None => Self {
                label: "checking".to_string(),
                expiring_soon: false,
            },
            Some(l) if l.is_free() => Self {
                label: "Free".to_string(),
                expiring_soon: false,
            },
            Some(l) if !l.is_active => Self {
                label: "Inactive".to_string(),
                expiring_soon: false,
            },
            Some(l) => Self {
                label: format!(
                    "{} ({})",
                    l.license_type,
                    time_remaining_label(l.expires_at, now)
                ),
                expiring_soon: l.expiring_soon(now),
            },
        }
    }
}

/// Frame header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub user: String,
    pub license: LicenseBadge,
    pub view: ViewMode,
    pub sort: SortCriteria,
    /// Poll interval in seconds, 0 when polling is off.
    pub interval_secs: u64,
    pub stats: Stats,
    pub last_update: Option<DateTime<Utc>>,
}

// ============================================================================
// Frame
// ============================================================================

/// Body of a frame. Exactly one variant per render.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewBody {
    Treemap(Vec<PairView>),
    Grid(Vec<PairView>),
    List(Vec<PairView>),
    /// Access granted, but nothing passes the filters.
    NoMatches,
    /// Access denied: purchase or renewal prompt.
    AccessDenied(Access),
}

impl ViewBody {
    pub fn pairs(&self) -> &[PairView] {
        match self {
            Self::Treemap(p) | Self::Grid(p) | Self::List(p) => p,
            Self::NoMatches | Self::AccessDenied(_) => &[],
        }
    }

    pub fn pairs_mut(&mut self) -> &mut [PairView] {
        match self {
            Self::Treemap(p) | Self::Grid(p) | Self::List(p) => p,
            Self::NoMatches | Self::AccessDenied(_) => &mut [],
        }
    }
}

/// Complete rendered state of the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: ViewBody,
    pub rendered_at: DateTime<Utc>,
}

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "ok"),
            Self::Warning => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    /// Notices for a license transition. Silent for adoption and paid-tier swaps.
    pub fn for_license_change(change: LicenseChange) -> Vec<Notice> {
        match change {
            LicenseChange::DowngradedToFree => vec![
                Self::warning("Your license changed to Free. Access is restricted."),
                Self::info(PURCHASE_PROMPT),
            ],
            LicenseChange::Activated => vec![Self::success("Your license is activated!")],
            LicenseChange::Deactivated => vec![Self::warning("Your license was deactivated.")],
            LicenseChange::Adopted | LicenseChange::TypeChanged => Vec::new(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

pub(crate) const PURCHASE_PROMPT: &str =
    "Purchase a license in the Telegram bot to unlock trading pairs.";
