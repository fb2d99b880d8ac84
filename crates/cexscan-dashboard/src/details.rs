//! Single-instance pair details overlay.

use cexscan_core::format::{
    details_age_label, format_number, format_percent, format_price, format_usd,
};
use cexscan_core::{HeatClass, TradingPair};
use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::store::DataStore;

/// Outcome of refreshing the overlay after new data arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsRefresh {
    /// Nothing open.
    Idle,
    Updated,
    /// The pair disappeared from the data.
    Closed,
}

/// Details for at most one pair.
///
/// Holds its own copy of the pair so the `Updated ... ago` label keeps
/// ticking between fetches.
#[derive(Debug, Default)]
pub struct DetailsOverlay {
    pair: Option<TradingPair>,
}

impl DetailsOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open for `pair`, replacing whatever was open.
    pub fn open(&mut self, pair: TradingPair) {
        self.pair = Some(pair);
    }

    /// Returns true if something was open.
    pub fn close(&mut self) -> bool {
        self.pair.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.pair.is_some()
    }

    pub fn pair(&self) -> Option<&TradingPair> {
        self.pair.as_ref()
    }

    pub fn pair_id(&self) -> Option<&str> {
        self.pair.as_ref().map(|p| p.id.as_str())
    }

    /// Re-read the open pair from the store.
    pub fn refresh(&mut self, store: &DataStore) -> DetailsRefresh {
        let Some(id) = self.pair_id() else {
            return DetailsRefresh::Idle;
        };
        match store.find(id).cloned() {
            Some(fresh) => {
                self.pair = Some(fresh);
                DetailsRefresh::Updated
            }
            None => {
                self.pair = None;
                DetailsRefresh::Closed
            }
        }
    }

    pub fn render(&self, now: DateTime<Utc>) -> Option<String> {
        self.pair.as_ref().map(|pair| render_details(pair, now))
    }
}

fn render_details(pair: &TradingPair, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ({}) ==", pair.coin_pair, pair.network);
    let _ = writeln!(
        out,
        "Spread:     {} [{}]",
        format_percent(pair.spread),
        HeatClass::from_spread(pair.spread)
    );
    let _ = writeln!(
        out,
        "Buy:        {} @ {}",
        pair.buy_exchange,
        format_price(pair.buy_price)
    );
    let _ = writeln!(
        out,
        "Sell:       {} @ {}",
        pair.sell_exchange,
        format_price(pair.sell_price)
    );
    let _ = writeln!(out, "Volume:     {}", format_usd(pair.available_volume_usd));
    let commission = pair
        .commission
        .map(format_price)
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Commission: {commission}");
    let _ = writeln!(out, "Profit:     ${}", format_number(pair.profit()));
    let updated = pair
        .age_secs(now)
        .map(details_age_label)
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(out, "Updated:    {updated}");
    let _ = writeln!(out, "Pinned:     {}", if pair.is_pinned { "yes" } else { "no" });
    if let Some(url) = &pair.buy_url {
        let _ = writeln!(out, "Buy link:   {url}");
    }
    if let Some(url) = &pair.sell_url {
        let _ = writeln!(out, "Sell link:  {url}");
    }
    let _ = writeln!(out, "Id:         {}", pair.id);
    out
}
