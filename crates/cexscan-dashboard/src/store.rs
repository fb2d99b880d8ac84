//! Last-fetched and filtered pair collections.

use cexscan_core::{
    annotate_pinned, apply, FilterCriteria, PinnedPair, SortCriteria, TradingPair,
};
use chrono::{DateTime, Utc};

/// Summary shown in the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub count: usize,
    pub max_spread: f64,
    pub total_volume: f64,
}

/// Holds raw pairs from the last fetch and the filtered, sorted view of them.
///
/// The filtered collection is recomputed whenever pairs, criteria or sort
/// change. While access is denied the store is kept empty.
#[derive(Debug, Default)]
pub struct DataStore {
    raw: Vec<TradingPair>,
    filtered: Vec<TradingPair>,
    criteria: FilterCriteria,
    sort: SortCriteria,
    last_update: Option<DateTime<Utc>>,
}

impl DataStore {
    pub fn new(criteria: FilterCriteria, sort: SortCriteria) -> Self {
        Self {
            criteria,
            sort,
            ..Default::default()
        }
    }

    /// Replace pairs wholesale with a fresh fetch.
    pub fn replace(
        &mut self,
        mut pairs: Vec<TradingPair>,
        pinned: &[PinnedPair],
        now: DateTime<Utc>,
    ) {
        annotate_pinned(&mut pairs, pinned);
        self.raw = pairs;
        self.last_update = Some(now);
        self.refilter(now);
    }

    /// Drop all pairs.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.filtered.clear();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria, now: DateTime<Utc>) {
        self.criteria = criteria;
        self.refilter(now);
    }

    pub fn set_sort(&mut self, sort: SortCriteria, now: DateTime<Utc>) {
        self.sort = sort;
        self.refilter(now);
    }

    pub fn refilter(&mut self, now: DateTime<Utc>) {
        self.filtered = apply(&self.raw, &self.criteria, self.sort, now);
        tracing::trace!(
            raw = self.raw.len(),
            visible = self.filtered.len(),
            "Pairs refiltered"
        );
    }

    pub fn raw(&self) -> &[TradingPair] {
        &self.raw
    }

    pub fn filtered(&self) -> &[TradingPair] {
        &self.filtered
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn sort(&self) -> SortCriteria {
        self.sort
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Look a pair up among the raw pairs, regardless of filters.
    pub fn find(&self, id: &str) -> Option<&TradingPair> {
        self.raw.iter().find(|pair| pair.id == id)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            count: self.filtered.len(),
            max_spread: self
                .filtered
                .iter()
                .map(|pair| pair.spread)
                .fold(0.0, f64::max),
            total_volume: self
                .filtered
                .iter()
                .map(|pair| pair.available_volume_usd)
                .sum(),
        }
    }
}
