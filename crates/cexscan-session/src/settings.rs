//! Settings persistence.
//!
//! Every write sends the full settings object: the cached settings
//! overlaid with the changed fields. On a successful outcome (persisted, or
//! kept local-only while the endpoint cools down) the cache is replaced with
//! exactly the object sent, not with a server echo. A rejected or failed
//! write leaves the cache untouched.
//!
//! Range sliders go through `persist_debounced`, which keeps one pending
//! write per key and restarts its timer on every call. Discrete choices use
//! `persist`, or `persist_in_background` from code that must not wait.
//! `flush` waits for background writes before sending the full object.

use cexscan_api::{ApiClient, SettingsWriteOutcome};
use cexscan_core::UserSettings;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::scheduler::KeyedTasks;

const DEBOUNCE_KEY_PREFIX: &str = "settings:";

#[derive(Clone)]
pub struct SettingsSync {
    api: ApiClient,
    user_id: String,
    cache: Arc<Mutex<UserSettings>>,
    tasks: KeyedTasks,
    /// Background writes not yet awaited by `flush`.
    writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
    debounce: Duration,
}

impl SettingsSync {
    pub fn new(
        api: ApiClient,
        user_id: impl Into<String>,
        initial: UserSettings,
        debounce: Duration,
    ) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            cache: Arc::new(Mutex::new(initial)),
            tasks: KeyedTasks::new(),
            writes: Arc::new(Mutex::new(Vec::new())),
            debounce,
        }
    }

    /// Last settings believed to be stored.
    pub fn current(&self) -> UserSettings {
        self.cache.lock().clone()
    }

    /// Write `patch` merged over the cache immediately.
    pub async fn persist(&self, patch: UserSettings) -> SettingsWriteOutcome {
        let merged = self.cache.lock().merged_with(&patch);
        let outcome = self.api.update_settings(&self.user_id, &merged).await;
        match &outcome {
            SettingsWriteOutcome::Persisted => {
                debug!(user_id = %self.user_id, "Settings saved");
                *self.cache.lock() = merged;
            }
            SettingsWriteOutcome::LocalOnly => {
                debug!(user_id = %self.user_id, "Settings saved locally only");
                *self.cache.lock() = merged;
            }
            SettingsWriteOutcome::Rejected(reason) => {
                warn!(user_id = %self.user_id, reason = %reason, "Settings write rejected");
            }
            SettingsWriteOutcome::Failed(reason) => {
                warn!(user_id = %self.user_id, reason = %reason, "Settings write failed");
            }
        }
        outcome
    }

    /// Spawn `persist(patch)` and hand its outcome to `on_done`.
    pub fn persist_in_background<F>(&self, patch: UserSettings, on_done: F)
    where
        F: FnOnce(SettingsWriteOutcome) + Send + 'static,
    {
        let sync = self.clone();
        let handle = tokio::spawn(async move {
            on_done(sync.persist(patch).await);
        });
        let mut writes = self.writes.lock();
        writes.retain(|write| !write.is_finished());
        writes.push(handle);
    }

    /// Write `patch` once `key` has been quiet for the debounce period.
    ///
    /// A later call with the same key replaces the pending write.
    pub fn persist_debounced(&self, key: &str, patch: UserSettings) {
        let sync = self.clone();
        self.tasks.spawn_after(
            &format!("{DEBOUNCE_KEY_PREFIX}{key}"),
            self.debounce,
            async move {
                sync.persist(patch).await;
            },
        );
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.tasks.is_active(&format!("{DEBOUNCE_KEY_PREFIX}{key}"))
    }

    /// Drop pending debounced writes, wait for background writes, then
    /// persist `full`.
    pub async fn flush(&self, full: UserSettings) -> SettingsWriteOutcome {
        let dropped = self.tasks.cancel_prefix(DEBOUNCE_KEY_PREFIX);
        if dropped > 0 {
            debug!(dropped, "Pending settings writes folded into flush");
        }
        let in_flight: Vec<_> = self.writes.lock().drain(..).collect();
        if !in_flight.is_empty() {
            debug!(count = in_flight.len(), "Waiting for background settings writes");
        }
        for write in in_flight {
            let _ = write.await;
        }
        self.persist(full).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cexscan_api::{HttpMethod, MockReply, MockTransport, RetryConfig, RetryingHttpClient};
    use cexscan_core::{SortField, ViewMode};
    use serde_json::json;

    const PATH: &str = "/users/u1/settings";

    fn setup(initial: UserSettings) -> (Arc<MockTransport>, SettingsSync) {
        let mock = Arc::new(MockTransport::new());
        let http = Arc::new(RetryingHttpClient::new(
            mock.clone(),
            RetryConfig {
                max_retries: 1,
                max_jitter: Duration::ZERO,
                ..Default::default()
            },
        ));
        let api = ApiClient::new("http://mock", http).unwrap();
        let sync = SettingsSync::new(api, "u1", initial, Duration::from_millis(500));
        (mock, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_sends_merged_object_and_replaces_cache() {
        let initial = UserSettings {
            update_interval: Some(30),
            ..Default::default()
        };
        let (mock, sync) = setup(initial);
        mock.on(HttpMethod::Put, PATH, MockReply::ok(json!({"success": true, "settings": {}})));

        let outcome = sync
            .persist(UserSettings {
                view_mode: Some(ViewMode::List),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, SettingsWriteOutcome::Persisted);
        let body = mock.calls()[0].body.clone().unwrap();
        assert_eq!(body, json!({"update_interval": 30, "view_mode": "list"}));
        // Cache holds what was sent, not the (empty) server echo.
        assert_eq!(sync.current().update_interval, Some(30));
        assert_eq!(sync.current().view_mode, Some(ViewMode::List));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_write_keeps_cache() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(
            HttpMethod::Put,
            PATH,
            MockReply::ok(json!({"success": false, "error": "invalid"})),
        );

        let outcome = sync
            .persist(UserSettings {
                sort_field: Some(SortField::Coin),
                ..Default::default()
            })
            .await;

        assert!(!outcome.is_success());
        assert_eq!(sync.current(), UserSettings::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_write_keeps_cache() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(HttpMethod::Put, PATH, MockReply::status(500));

        let outcome = sync
            .persist(UserSettings {
                spread_min: Some(1.0),
                ..Default::default()
            })
            .await;

        assert!(matches!(outcome, SettingsWriteOutcome::Failed(_)));
        assert_eq!(sync.current().spread_min, None);
        assert_eq!(mock.call_count(HttpMethod::Put, PATH), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooling_endpoint_is_local_only_success() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(HttpMethod::Put, PATH, MockReply::status(500));
        let first = UserSettings {
            spread_min: Some(1.0),
            ..Default::default()
        };
        sync.persist(first).await;

        let outcome = sync
            .persist(UserSettings {
                spread_min: Some(2.0),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, SettingsWriteOutcome::LocalOnly);
        assert_eq!(sync.current().spread_min, Some(2.0));
        assert_eq!(mock.call_count(HttpMethod::Put, PATH), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_background_writes() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(
            HttpMethod::Put,
            PATH,
            MockReply::ok(json!({"success": true})).delayed(Duration::from_secs(2)),
        )
        .on(HttpMethod::Put, PATH, MockReply::ok(json!({"success": true})));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        sync.persist_in_background(
            UserSettings {
                sort_field: Some(SortField::Coin),
                ..Default::default()
            },
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        let full = UserSettings {
            view_mode: Some(ViewMode::Grid),
            ..Default::default()
        };
        assert_eq!(sync.flush(full).await, SettingsWriteOutcome::Persisted);

        assert_eq!(rx.try_recv().unwrap(), SettingsWriteOutcome::Persisted);
        let bodies: Vec<_> = mock.calls().into_iter().filter_map(|c| c.body).collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], json!({"sort_field": "coin"}));
        assert_eq!(bodies[1], json!({"sort_field": "coin", "view_mode": "grid"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_slider_moves() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(HttpMethod::Put, PATH, MockReply::ok(json!({"success": true})));

        for min in [0.5, 1.0, 1.5] {
            sync.persist_debounced(
                "spread",
                UserSettings {
                    spread_min: Some(min),
                    ..Default::default()
                },
            );
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(sync.has_pending("spread"));
        assert_eq!(mock.call_count(HttpMethod::Put, PATH), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(mock.call_count(HttpMethod::Put, PATH), 1);
        assert_eq!(sync.current().spread_min, Some(1.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_pending_and_writes_full() {
        let (mock, sync) = setup(UserSettings::default());
        mock.on(HttpMethod::Put, PATH, MockReply::ok(json!({"success": true})));

        sync.persist_debounced(
            "volume",
            UserSettings {
                volume_max: Some(500.0),
                ..Default::default()
            },
        );
        let full = UserSettings {
            volume_max: Some(800.0),
            view_mode: Some(ViewMode::Grid),
            ..Default::default()
        };
        assert_eq!(sync.flush(full).await, SettingsWriteOutcome::Persisted);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.call_count(HttpMethod::Put, PATH), 1);
        assert_eq!(sync.current().volume_max, Some(800.0));
    }
}
