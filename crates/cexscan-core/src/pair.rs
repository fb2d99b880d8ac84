//! Trading pair records.
//!
//! A `TradingPair` is one arbitrage opportunity: buy a coin on one exchange,
//! sell it on another, pocketing `spread` percent on up to
//! `available_volume_usd`. Pairs are replaced wholesale on every fetch; the
//! only client-side annotation is `is_pinned`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{de_f64_lenient, de_id, de_opt_timestamp};

/// One arbitrage opportunity between two exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Backend document id.
    #[serde(rename = "_id", alias = "id", deserialize_with = "de_id")]
    pub id: String,
    /// Coin pair label (e.g., "BTC/USDT").
    pub coin_pair: String,
    /// Transfer network (e.g., "TRC20").
    #[serde(default)]
    pub network: String,
    /// Exchange to buy on.
    pub buy_exchange: String,
    /// Exchange to sell on.
    pub sell_exchange: String,
    /// Ask on the buy exchange.
    #[serde(default, deserialize_with = "de_f64_lenient")]
    pub buy_price: f64,
    /// Bid on the sell exchange.
    #[serde(default, deserialize_with = "de_f64_lenient")]
    pub sell_price: f64,
    /// Spread in percent.
    #[serde(deserialize_with = "de_f64_lenient")]
    pub spread: f64,
    /// Volume that can be moved at this spread (USD).
    #[serde(default, deserialize_with = "de_f64_lenient")]
    pub available_volume_usd: f64,
    /// When upstream last refreshed this pair's prices.
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub alive_time: Option<DateTime<Utc>>,
    /// Link to the buy market.
    #[serde(default)]
    pub buy_url: Option<String>,
    /// Link to the sell market.
    #[serde(default)]
    pub sell_url: Option<String>,
    /// Withdrawal commission in units of the coin.
    #[serde(default)]
    pub commission: Option<f64>,
    /// Pinned by the current user (annotated client-side from `pinned_pairs`).
    #[serde(default)]
    pub is_pinned: bool,
}

impl TradingPair {
    /// Coin symbol: the part of `coin_pair` before the slash.
    pub fn coin(&self) -> &str {
        self.coin_pair
            .split('/')
            .next()
            .unwrap_or(self.coin_pair.as_str())
    }

    /// Expected profit in USD: volume × spread / 100. Derived, never stored.
    pub fn profit(&self) -> f64 {
        self.available_volume_usd * self.spread / 100.0
    }

    /// Seconds elapsed since `alive_time`, floored. `None` without a timestamp.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.alive_time
            .map(|alive| (now - alive).num_milliseconds().div_euclid(1000))
    }
}

/// Pin relation returned alongside active pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedPair {
    #[serde(deserialize_with = "de_id")]
    pub pair_id: String,
}

/// Mark every pair whose id appears in `pinned`.
pub fn annotate_pinned(pairs: &mut [TradingPair], pinned: &[PinnedPair]) {
    for pair in pairs.iter_mut() {
        pair.is_pinned = pinned.iter().any(|p| p.pair_id == pair.id);
    }
}

/// Static reference entry (exchange or coin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
