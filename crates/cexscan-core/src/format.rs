//! Heat classes and display labels.

use chrono::{DateTime, Utc};
use std::fmt;

/// Visual bucket derived from spread magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeatClass {
    Cold,
    Cool,
    Warm,
    Warmer,
    Hot,
    VeryHot,
}

impl HeatClass {
    /// Thresholds: <0.5 cold, <1 cool, <2 warm, <3 warmer, <5 hot, else very-hot.
    pub fn from_spread(spread: f64) -> Self {
        if spread < 0.5 {
            Self::Cold
        } else if spread < 1.0 {
            Self::Cool
        } else if spread < 2.0 {
            Self::Warm
        } else if spread < 3.0 {
            Self::Warmer
        } else if spread < 5.0 {
            Self::Hot
        } else {
            Self::VeryHot
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Cool => "cool",
            Self::Warm => "warm",
            Self::Warmer => "warmer",
            Self::Hot => "hot",
            Self::VeryHot => "very-hot",
        }
    }

    /// One-character shade used by the text renderers.
    pub fn glyph(&self) -> char {
        match self {
            Self::Cold => '.',
            Self::Cool => ':',
            Self::Warm => '+',
            Self::Warmer => '*',
            Self::Hot => '#',
            Self::VeryHot => '@',
        }
    }
}

impl fmt::Display for HeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact age for tiles and rows: `Ns`, `Nm`, `Nh` or `Nd`.
pub fn age_label(age_secs: i64) -> String {
    let secs = age_secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

/// Detailed age for the details overlay: `[Nh ][Nm ]Ns ago`.
pub fn details_age_label(age_secs: i64) -> String {
    let secs = age_secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s ago"));
    out
}

/// Time left until `expires_at`.
pub fn time_remaining_label(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(expires_at) = expires_at else {
        return "no expiry".to_string();
    };
    let millis = (expires_at - now).num_milliseconds();
    if millis <= 0 {
        return "expired".to_string();
    }
    let secs = millis / 1000;
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Price in plain decimal notation, never scientific.
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "0".to_string();
    }
    format!("{price}")
}

/// Percentage with two decimals.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Whole dollars with thousands separators, e.g. `$12,500`.
pub fn format_usd(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}${}", group_thousands(&format!("{:.0}", rounded.abs())))
}

/// Up to two decimals with thousands separators, trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{}", group_thousands(int_part))
    } else {
        format!("{sign}{}.{frac}", group_thousands(int_part))
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
