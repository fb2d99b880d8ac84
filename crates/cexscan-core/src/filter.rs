//! Filter and sort pipeline.
//!
//! Pure functions from (raw pairs, filter criteria, sort criteria, now) to an
//! ordered subset. Nothing here touches the network or the clock; callers
//! pass `now` explicitly so age predicates are reproducible.
//!
//! ```text
//! raw pairs ──► filter_pairs (all predicates) ──► sort_pairs (stable) ──► view
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{CoreError, Result};
use crate::pair::TradingPair;
use crate::settings::{SortCriteria, SortField, SortOrder, UserSettings};

pub const DEFAULT_SPREAD_MAX: f64 = 100.0;
pub const DEFAULT_VOLUME_MAX: f64 = 10_000.0;
/// Freshness slider upper bound, in minutes (24 h).
pub const DEFAULT_AGE_MAX_MINUTES: f64 = 1440.0;

// ============================================================================
// Range
// ============================================================================

/// Closed numeric interval. Always `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    min: f64,
    max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(CoreError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Move the lower handle; drags the upper handle along if crossed.
    pub fn set_min(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.min = value;
        if self.max < value {
            self.max = value;
        }
    }

    /// Move the upper handle; drags the lower handle along if crossed.
    pub fn set_max(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.max = value;
        if self.min > value {
            self.min = value;
        }
    }

    /// Set both handles, as two successive drags (min first).
    pub fn set(&mut self, min: f64, max: f64) {
        self.set_min(min);
        self.set_max(max);
    }
}

// ============================================================================
// FilterCriteria
// ============================================================================

/// Which tag set a selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Coin,
    BuyExchange,
    SellExchange,
}

/// Conjunctive filter over pairs.
///
/// An empty selection set means every value passes.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Spread, percent.
    pub spread: Range,
    /// Available volume, USD.
    pub volume: Range,
    /// Age since `alive_time`, seconds.
    pub age_secs: Range,
    pub coins: BTreeSet<String>,
    pub buy_exchanges: BTreeSet<String>,
    pub sell_exchanges: BTreeSet<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            spread: Range {
                min: 0.0,
                max: DEFAULT_SPREAD_MAX,
            },
            volume: Range {
                min: 0.0,
                max: DEFAULT_VOLUME_MAX,
            },
            age_secs: Range {
                min: 0.0,
                max: DEFAULT_AGE_MAX_MINUTES * 60.0,
            },
            coins: BTreeSet::new(),
            buy_exchanges: BTreeSet::new(),
            sell_exchanges: BTreeSet::new(),
        }
    }
}

impl FilterCriteria {
    /// Build criteria from stored settings, falling back to defaults per field.
    pub fn from_settings(settings: &UserSettings) -> Self {
        let mut criteria = Self::default();
        criteria.spread.set(
            settings.spread_min.unwrap_or(0.0),
            settings.spread_max.unwrap_or(DEFAULT_SPREAD_MAX),
        );
        criteria.volume.set(
            settings.volume_min.unwrap_or(0.0),
            settings.volume_max.unwrap_or(DEFAULT_VOLUME_MAX),
        );
        criteria.age_secs.set(
            settings.time_min.unwrap_or(0.0) * 60.0,
            settings.time_max.unwrap_or(DEFAULT_AGE_MAX_MINUTES) * 60.0,
        );
        if let Some(coins) = &settings.selected_coins {
            criteria.coins = coins.iter().cloned().collect();
        }
        if let Some(buy) = &settings.selected_buy_exchanges {
            criteria.buy_exchanges = buy.iter().cloned().collect();
        }
        if let Some(sell) = &settings.selected_sell_exchanges {
            criteria.sell_exchanges = sell.iter().cloned().collect();
        }
        criteria
    }

    /// Settings patch carrying the range fields (age in minutes).
    pub fn ranges_patch(&self) -> UserSettings {
        UserSettings {
            spread_min: Some(self.spread.min),
            spread_max: Some(self.spread.max),
            volume_min: Some(self.volume.min),
            volume_max: Some(self.volume.max),
            time_min: Some(self.age_secs.min / 60.0),
            time_max: Some(self.age_secs.max / 60.0),
            ..Default::default()
        }
    }

    /// Settings patch carrying the three selection sets.
    pub fn selections_patch(&self) -> UserSettings {
        UserSettings {
            selected_coins: Some(self.coins.iter().cloned().collect()),
            selected_buy_exchanges: Some(self.buy_exchanges.iter().cloned().collect()),
            selected_sell_exchanges: Some(self.sell_exchanges.iter().cloned().collect()),
            ..Default::default()
        }
    }

    pub fn tags(&self, kind: TagKind) -> &BTreeSet<String> {
        match kind {
            TagKind::Coin => &self.coins,
            TagKind::BuyExchange => &self.buy_exchanges,
            TagKind::SellExchange => &self.sell_exchanges,
        }
    }

    fn tags_mut(&mut self, kind: TagKind) -> &mut BTreeSet<String> {
        match kind {
            TagKind::Coin => &mut self.coins,
            TagKind::BuyExchange => &mut self.buy_exchanges,
            TagKind::SellExchange => &mut self.sell_exchanges,
        }
    }

    /// Toggle one tag. Returns true if it is now selected.
    pub fn toggle(&mut self, kind: TagKind, symbol: &str) -> bool {
        let tags = self.tags_mut(kind);
        if tags.remove(symbol) {
            false
        } else {
            tags.insert(symbol.to_string());
            true
        }
    }

    /// Clear a selection set, i.e. select all.
    pub fn select_all(&mut self, kind: TagKind) {
        self.tags_mut(kind).clear();
    }

    /// Whether `pair` satisfies every active predicate at `now`.
    pub fn matches(&self, pair: &TradingPair, now: DateTime<Utc>) -> bool {
        if !self.spread.contains(pair.spread) {
            return false;
        }
        if !self.volume.contains(pair.available_volume_usd) {
            return false;
        }
        if let Some(age) = pair.age_secs(now) {
            if !self.age_secs.contains(age as f64) {
                return false;
            }
        }
        selected(&self.coins, pair.coin())
            && selected(&self.buy_exchanges, &pair.buy_exchange)
            && selected(&self.sell_exchanges, &pair.sell_exchange)
    }
}

fn selected(set: &BTreeSet<String>, value: &str) -> bool {
    set.is_empty() || set.contains(value)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Pairs passing `criteria`, in input order.
pub fn filter_pairs(
    pairs: &[TradingPair],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<TradingPair> {
    pairs
        .iter()
        .filter(|pair| criteria.matches(pair, now))
        .cloned()
        .collect()
}

/// Stable in-place sort. Equal keys keep their input order in both directions.
pub fn sort_pairs(pairs: &mut [TradingPair], sort: SortCriteria) {
    pairs.sort_by(|a, b| {
        let ord = compare_by(sort.field, a, b);
        match sort.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Filter then sort.
pub fn apply(
    pairs: &[TradingPair],
    criteria: &FilterCriteria,
    sort: SortCriteria,
    now: DateTime<Utc>,
) -> Vec<TradingPair> {
    let mut out = filter_pairs(pairs, criteria, now);
    sort_pairs(&mut out, sort);
    out
}

fn compare_by(field: SortField, a: &TradingPair, b: &TradingPair) -> Ordering {
    match field {
        SortField::Coin => locale_cmp(a.coin(), b.coin()),
        SortField::Network => locale_cmp(&a.network, &b.network),
        SortField::Spread => a.spread.total_cmp(&b.spread),
        SortField::Profit => a.profit().total_cmp(&b.profit()),
    }
}

/// Case-insensitive comparison; lowercase sorts first among case variants.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HeatClass;
    use crate::pair::fixtures::pair;
    use chrono::Duration;

    fn ids(pairs: &[TradingPair]) -> Vec<&str> {
        pairs.iter().map(|p| p.id.as_str()).collect()
    }

    fn sample() -> Vec<TradingPair> {
        let now = Utc::now();
        let mut pairs = vec![
            pair("1", "BTC/USDT", 0.2, 5_000.0),
            pair("2", "ETH/USDT", 1.5, 20_000.0),
            pair("3", "SOL/USDT", 3.0, 800.0),
            pair("4", "btc/USDC", 7.5, 50.0),
            pair("5", "XRP/USDT", 0.9, 300.0),
        ];
        pairs[1].buy_exchange = "bybit".to_string();
        pairs[2].sell_exchange = "gate".to_string();
        pairs[3].alive_time = Some(now - Duration::minutes(30));
        pairs[4].alive_time = Some(now - Duration::hours(30));
        pairs
    }

    // ========================================================================
    // Range
    // ========================================================================

    #[test]
    fn test_range_rejects_inverted() {
        assert!(Range::new(2.0, 1.0).is_err());
        assert!(Range::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_range_drag_keeps_order() {
        let mut range = Range::new(1.0, 5.0).unwrap();
        range.set_min(8.0);
        assert_eq!((range.min(), range.max()), (8.0, 8.0));

        range.set_max(2.0);
        assert_eq!((range.min(), range.max()), (2.0, 2.0));

        range.set(3.0, 1.0);
        assert!(range.min() <= range.max());
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    #[test]
    fn test_default_filter_drops_out_of_range() {
        let now = Utc::now();
        let out = filter_pairs(&sample(), &FilterCriteria::default(), now);
        // "2": volume above 10k; "5": older than 24h.
        assert_eq!(ids(&out), vec!["1", "3", "4"]);
    }

    #[test]
    fn test_filter_result_is_subset_satisfying_predicates() {
        let now = Utc::now();
        let input = sample();
        let mut criteria = FilterCriteria::default();
        criteria.spread.set(0.5, 10.0);
        criteria.volume.set(0.0, 100_000.0);
        criteria.age_secs.set(0.0, 3600.0);
        criteria.toggle(TagKind::SellExchange, "okx");

        let out = filter_pairs(&input, &criteria, now);

        assert!(!out.is_empty());
        for p in &out {
            assert!(input.contains(p));
            assert!(criteria.spread.contains(p.spread));
            assert!(criteria.volume.contains(p.available_volume_usd));
            assert_eq!(p.sell_exchange, "okx");
            if let Some(age) = p.age_secs(now) {
                assert!(criteria.age_secs.contains(age as f64));
            }
        }
        assert_eq!(ids(&out), vec!["2", "4"]);
    }

    #[test]
    fn test_coin_selection_matches_symbol_before_slash() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.volume.set_max(100_000.0);
        criteria.toggle(TagKind::Coin, "ETH");
        let out = filter_pairs(&sample(), &criteria, now);
        assert_eq!(ids(&out), vec!["2"]);

        criteria.select_all(TagKind::Coin);
        assert!(criteria.tags(TagKind::Coin).is_empty());
    }

    #[test]
    fn test_toggle_twice_restores_all() {
        let mut criteria = FilterCriteria::default();
        assert!(criteria.toggle(TagKind::BuyExchange, "binance"));
        assert!(!criteria.toggle(TagKind::BuyExchange, "binance"));
        assert!(criteria.buy_exchanges.is_empty());
    }

    #[test]
    fn test_settings_round_trip_uses_minutes() {
        let settings = UserSettings {
            spread_min: Some(0.5),
            time_min: Some(1.0),
            time_max: Some(60.0),
            selected_coins: Some(vec!["BTC".to_string()]),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_settings(&settings);
        assert_eq!(criteria.age_secs.min(), 60.0);
        assert_eq!(criteria.age_secs.max(), 3600.0);
        assert_eq!(criteria.spread.max(), DEFAULT_SPREAD_MAX);
        assert!(criteria.coins.contains("BTC"));

        let patch = criteria.ranges_patch();
        assert_eq!(patch.time_max, Some(60.0));
        assert_eq!(patch.spread_min, Some(0.5));
        assert!(patch.selected_coins.is_none());
    }

    // ========================================================================
    // Sorting
    // ========================================================================

    #[test]
    fn test_profit_desc_matches_manual_computation() {
        let mut pairs = vec![
            pair("pair1", "A/USDT", 1.0, 100.0),
            pair("pair2", "B/USDT", 0.5, 200.0),
            pair("pair3", "C/USDT", 4.0, 50.0),
            pair("pair4", "D/USDT", 0.1, 400.0),
        ];
        sort_pairs(
            &mut pairs,
            SortCriteria::new(SortField::Profit, SortOrder::Desc),
        );
        // profits: 1, 1, 2, 0.4
        assert_eq!(ids(&pairs), vec!["pair3", "pair1", "pair2", "pair4"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut pairs = vec![
            pair("a", "X/USDT", 1.0, 1.0),
            pair("b", "Y/USDT", 2.0, 1.0),
            pair("c", "Z/USDT", 1.0, 1.0),
            pair("d", "W/USDT", 2.0, 1.0),
        ];
        let sort = SortCriteria::new(SortField::Spread, SortOrder::Asc);
        sort_pairs(&mut pairs, sort);
        assert_eq!(ids(&pairs), vec!["a", "c", "b", "d"]);

        let once = pairs.clone();
        sort_pairs(&mut pairs, sort);
        assert_eq!(pairs, once);

        sort_pairs(
            &mut pairs,
            SortCriteria::new(SortField::Network, SortOrder::Desc),
        );
        assert_eq!(ids(&pairs), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_coin_sort_is_case_insensitive() {
        let mut pairs = vec![
            pair("1", "eth/USDT", 1.0, 1.0),
            pair("2", "BTC/USDT", 1.0, 1.0),
            pair("3", "Ada/USDT", 1.0, 1.0),
        ];
        sort_pairs(&mut pairs, SortCriteria::new(SortField::Coin, SortOrder::Asc));
        assert_eq!(ids(&pairs), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_locale_cmp_lowercase_first() {
        assert_eq!(locale_cmp("a", "A"), Ordering::Less);
        assert_eq!(locale_cmp("b", "A"), Ordering::Greater);
        assert_eq!(locale_cmp("TRC20", "TRC20"), Ordering::Equal);
    }

    #[test]
    fn test_default_pipeline_orders_by_spread_and_heat() {
        let now = Utc::now();
        let pairs = vec![
            pair("x", "A/USDT", 0.3, 10.0),
            pair("y", "B/USDT", 1.2, 10.0),
            pair("z", "C/USDT", 4.5, 10.0),
        ];

        let out = apply(&pairs, &FilterCriteria::default(), SortCriteria::default(), now);

        let spreads: Vec<f64> = out.iter().map(|p| p.spread).collect();
        assert_eq!(spreads, vec![4.5, 1.2, 0.3]);
        let heat: Vec<HeatClass> = out.iter().map(|p| HeatClass::from_spread(p.spread)).collect();
        assert_eq!(heat, vec![HeatClass::Hot, HeatClass::Warm, HeatClass::Cold]);
    }
}
