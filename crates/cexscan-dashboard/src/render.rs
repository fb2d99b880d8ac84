//! View selection and frame construction.

use cexscan_core::{Access, License, ViewMode};
use cexscan_telemetry::Metrics;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::DashboardConfig;
use crate::store::DataStore;
use crate::types::{Frame, Header, LicenseBadge, PairView, ViewBody};

/// Session facts the header needs besides the store.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub user: &'a str,
    pub license: Option<&'a License>,
    pub interval_secs: u64,
}

/// Owns the active view mode and the last rendered frame.
///
/// Exactly one mode is active. Switching modes drops the previous frame, so
/// nothing from the old mode survives into the new one. Age labels are kept
/// current by [`RenderScheduler::tick_labels`], which works on the stored
/// frame alone.
#[derive(Debug)]
pub struct RenderScheduler {
    config: DashboardConfig,
    mode: ViewMode,
    display_width: usize,
    frame: Option<Frame>,
}

impl RenderScheduler {
    pub fn new(config: DashboardConfig) -> Self {
        let default_view = config.default_view;
        let mut scheduler = Self {
            mode: ViewMode::Treemap,
            display_width: config.display_width,
            frame: None,
            config,
        };
        scheduler.set_mode(default_view);
        scheduler
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn display_width(&self) -> usize {
        self.display_width
    }

    /// List view needs a wide enough display.
    pub fn list_available(&self) -> bool {
        self.display_width >= self.config.list_min_width
    }

    /// Activate `mode`, returning the mode actually in effect.
    ///
    /// An unavailable list view falls back to grid.
    pub fn set_mode(&mut self, mode: ViewMode) -> ViewMode {
        let effective = if mode == ViewMode::List && !self.list_available() {
            debug!(width = self.display_width, "List view unavailable, using grid");
            ViewMode::Grid
        } else {
            mode
        };
        if effective != self.mode {
            self.frame = None;
        }
        self.mode = effective;
        effective
    }

    /// Resize the display. Returns the new mode if the list view had to fall
    /// back to grid.
    pub fn set_display_width(&mut self, width: usize) -> Option<ViewMode> {
        self.display_width = width;
        if self.mode == ViewMode::List && !self.list_available() {
            return Some(self.set_mode(ViewMode::Grid));
        }
        None
    }

    /// Build a fresh frame from the store.
    pub fn render(
        &mut self,
        store: &DataStore,
        ctx: RenderContext<'_>,
        now: DateTime<Utc>,
    ) -> &Frame {
        let access = Access::of(ctx.license);
        let body = if !access.is_granted() {
            ViewBody::AccessDenied(access)
        } else if store.filtered().is_empty() {
            ViewBody::NoMatches
        } else {
            self.body_for(store, now)
        };

        Metrics::render(self.mode.as_str());
        Metrics::visible_pairs(body.pairs().len());

        let frame = Frame {
            header: Header {
                user: ctx.user.to_string(),
                license: LicenseBadge::new(ctx.license, now),
                view: self.mode,
                sort: store.sort(),
                interval_secs: ctx.interval_secs,
                stats: store.stats(),
                last_update: store.last_update(),
            },
            body,
            rendered_at: now,
        };
        self.frame.insert(frame)
    }

    fn body_for(&self, store: &DataStore, now: DateTime<Utc>) -> ViewBody {
        let pairs = store.filtered();
        match self.mode {
            ViewMode::Treemap => ViewBody::Treemap(
                pairs
                    .iter()
                    .enumerate()
                    .map(|(i, pair)| {
                        let span = if i < self.config.emphasized_tiles { 2 } else { 1 };
                        PairView::new(pair, span, now)
                    })
                    .collect(),
            ),
            ViewMode::Grid => {
                ViewBody::Grid(pairs.iter().map(|p| PairView::new(p, 1, now)).collect())
            }
            ViewMode::List => {
                ViewBody::List(pairs.iter().map(|p| PairView::new(p, 1, now)).collect())
            }
        }
    }

    /// Recompute every visible age label from stored alive times.
    ///
    /// No refiltering happens here. Returns true if any label changed.
    pub fn tick_labels(&mut self, now: DateTime<Utc>) -> bool {
        let Some(frame) = self.frame.as_mut() else {
            return false;
        };
        let mut changed = false;
        for view in frame.body.pairs_mut() {
            changed |= view.refresh_age(now);
        }
        if changed {
            frame.rendered_at = now;
        }
        changed
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Visible pair at a 1-based position in the current frame.
    pub fn visible_at(&self, position: usize) -> Option<&PairView> {
        let index = position.checked_sub(1)?;
        self.frame.as_ref()?.body.pairs().get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::pair;
    use cexscan_core::{FilterCriteria, Range, SortCriteria};
    use chrono::Duration;

    fn ctx(license: Option<&License>) -> RenderContext<'_> {
        RenderContext {
            user: "alice",
            license,
            interval_secs: 10,
        }
    }

    fn store_with(count: usize, now: DateTime<Utc>) -> DataStore {
        let pairs = (0..count)
            .map(|i| {
                let mut p = pair(&format!("p{i}"), "BTC/USDT", 1.0 + i as f64, 100.0);
                p.alive_time = Some(now - Duration::seconds(10));
                p
            })
            .collect();
        let mut store = DataStore::new(FilterCriteria::default(), SortCriteria::default());
        store.replace(pairs, &[], now);
        store
    }

    // ========================================================================
    // Mode selection
    // ========================================================================

    #[test]
    fn test_default_mode_from_config() {
        let scheduler = RenderScheduler::new(DashboardConfig {
            default_view: ViewMode::Grid,
            ..Default::default()
        });
        assert_eq!(scheduler.mode(), ViewMode::Grid);
    }

    #[test]
    fn test_list_falls_back_to_grid_on_narrow_display() {
        let mut scheduler = RenderScheduler::new(DashboardConfig {
            display_width: 80,
            ..Default::default()
        });
        assert!(!scheduler.list_available());
        assert_eq!(scheduler.set_mode(ViewMode::List), ViewMode::Grid);
    }

    #[test]
    fn test_shrinking_display_leaves_list() {
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());
        assert_eq!(scheduler.set_mode(ViewMode::List), ViewMode::List);

        assert_eq!(scheduler.set_display_width(90), Some(ViewMode::Grid));
        assert_eq!(scheduler.mode(), ViewMode::Grid);
        assert_eq!(scheduler.set_display_width(200), None);
    }

    #[test]
    fn test_switching_mode_discards_frame() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let store = store_with(3, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());

        scheduler.render(&store, ctx(Some(&license)), now);
        assert!(scheduler.frame().is_some());

        scheduler.set_mode(ViewMode::Treemap);
        assert!(scheduler.frame().is_some());

        scheduler.set_mode(ViewMode::Grid);
        assert!(scheduler.frame().is_none());
        assert!(!scheduler.tick_labels(now + Duration::seconds(5)));
    }

    // ========================================================================
    // Frames
    // ========================================================================

    #[test]
    fn test_treemap_emphasizes_first_five() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let store = store_with(7, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());

        let frame = scheduler.render(&store, ctx(Some(&license)), now);

        let spans: Vec<u8> = frame.body.pairs().iter().map(|p| p.span).collect();
        assert_eq!(spans, vec![2, 2, 2, 2, 2, 1, 1]);
        assert_eq!(frame.header.stats.count, 7);
    }

    #[test]
    fn test_grid_and_list_have_uniform_spans() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let store = store_with(7, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());

        for mode in [ViewMode::Grid, ViewMode::List] {
            scheduler.set_mode(mode);
            let frame = scheduler.render(&store, ctx(Some(&license)), now);
            assert!(frame.body.pairs().iter().all(|p| p.span == 1));
        }
    }

    #[test]
    fn test_access_denied_hides_pairs() {
        let now = Utc::now();
        let free = License::new("Free", true);
        let store = store_with(3, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());

        let frame = scheduler.render(&store, ctx(Some(&free)), now);
        assert_eq!(frame.body, ViewBody::AccessDenied(Access::Free));

        let frame = scheduler.render(&store, ctx(None), now);
        assert_eq!(frame.body, ViewBody::AccessDenied(Access::Missing));
    }

    #[test]
    fn test_no_matches_body() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let mut store = store_with(3, now);
        let mut criteria = FilterCriteria::default();
        criteria.spread = Range::new(50.0, 60.0).unwrap();
        store.set_criteria(criteria, now);

        let mut scheduler = RenderScheduler::new(DashboardConfig::default());
        let frame = scheduler.render(&store, ctx(Some(&license)), now);
        assert_eq!(frame.body, ViewBody::NoMatches);
    }

    #[test]
    fn test_tick_updates_labels_without_store() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let store = store_with(2, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());
        scheduler.render(&store, ctx(Some(&license)), now);

        assert!(scheduler.tick_labels(now + Duration::seconds(60)));

        let frame = scheduler.frame().unwrap();
        assert!(frame.body.pairs().iter().all(|p| p.age_label == "1m"));
        assert_eq!(frame.header.stats.count, 2);
    }

    #[test]
    fn test_visible_at_is_one_based() {
        let now = Utc::now();
        let license = License::new("Pro", true);
        let store = store_with(3, now);
        let mut scheduler = RenderScheduler::new(DashboardConfig::default());
        scheduler.render(&store, ctx(Some(&license)), now);

        assert_eq!(scheduler.visible_at(1).map(|p| p.id.as_str()), Some("p2"));
        assert!(scheduler.visible_at(0).is_none());
        assert!(scheduler.visible_at(4).is_none());
    }
}
