//! Pair store, view scheduling and text rendering.
//!
//! ```text
//! ┌────────────┐  replace()  ┌───────────┐  render()  ┌─────────────────┐
//! │ pair fetch │ ──────────▶ │ DataStore │ ─────────▶ │ RenderScheduler │
//! └────────────┘             │ raw       │            │ mode + Frame    │
//!                            │ filtered  │            └────────┬────────┘
//!   filter / sort change ──▶ └───────────┘                     │ tick_labels()
//!                                                              ▼
//!                                                     text::render_frame()
//! ```
//!
//! The store refilters on every data, filter or sort change. The scheduler
//! turns the filtered pairs into a [`Frame`] for the active view mode; the
//! per-second tick only touches age labels inside that frame. The details
//! overlay keeps its own copy of one pair and is refreshed after each fetch.
//!
//! # Usage
//!
//! ```ignore
//! let mut store = DataStore::new(criteria, sort);
//! store.replace(response.active_pairs, &response.pinned_pairs, Utc::now());
//!
//! let mut scheduler = RenderScheduler::new(DashboardConfig::default());
//! let frame = scheduler.render(&store, ctx, Utc::now());
//! println!("{}", render_frame(frame, 120));
//! ```

mod config;
mod details;
mod error;
mod render;
mod store;
mod text;
mod types;

pub use config::DashboardConfig;
pub use details::{DetailsOverlay, DetailsRefresh};
pub use error::{DashboardError, DashboardResult};
pub use render::{RenderContext, RenderScheduler};
pub use store::{DataStore, Stats};
pub use text::{access_prompt, render_auth_required, render_frame};
pub use types::{Frame, Header, LicenseBadge, Notice, NoticeLevel, PairView, ViewBody};
