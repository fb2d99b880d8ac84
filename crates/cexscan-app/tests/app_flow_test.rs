//! Application flow integration tests.
//!
//! Drives `Application` through its event loop against a scripted backend:
//! - Session bootstrap and the authentication screen
//! - License gating and change handling
//! - Commands and settings persistence
//! - Pinning, details overlay and connectivity reset

use cexscan_api::{HttpMethod, MockReply, MockTransport};
use cexscan_app::{AppConfig, Application};
use cexscan_core::{Access, SortField, ViewMode};
use cexscan_session::{Identity, IdentityProvider, StaticIdentity};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Harness
// ============================================================================

/// Captures everything the application draws.
#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Screen {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Screen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Identity that can appear after startup.
#[derive(Default)]
struct SwitchableIdentity(Mutex<Option<Identity>>);

impl IdentityProvider for SwitchableIdentity {
    fn identity(&self) -> Option<Identity> {
        self.0.lock().clone()
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.api_url = "http://mock".to_string();
    config.http.max_retries = 1;
    config.http.max_jitter_ms = 0;
    config
}

fn build(
    mock: &Arc<MockTransport>,
    identity: Arc<dyn IdentityProvider>,
) -> (Application, Screen) {
    let screen = Screen::default();
    let app = Application::new(config(), mock.clone(), identity)
        .unwrap()
        .with_output(Box::new(screen.clone()), false);
    (app, screen)
}

fn user_u1() -> Arc<dyn IdentityProvider> {
    Arc::new(StaticIdentity(Some(Identity::new("u1", None))))
}

fn pro() -> Value {
    json!({"type": "Pro", "is_active": true})
}

fn free() -> Value {
    json!({"type": "Free", "is_active": true})
}

fn pair(id: &str, coin_pair: &str, spread: f64, volume: f64) -> Value {
    json!({
        "_id": {"$oid": id},
        "coin_pair": coin_pair,
        "network": "TRC20",
        "buy_exchange": "binance",
        "sell_exchange": "okx",
        "buy_price": 1.0,
        "sell_price": 1.0 + spread / 100.0,
        "spread": spread,
        "available_volume_usd": volume
    })
}

fn pairs_body(pairs: Vec<Value>) -> MockReply {
    MockReply::ok(json!({
        "success": true,
        "active_pairs": pairs,
        "pinned_pairs": [{"pair_id": {"$oid": "p2"}}]
    }))
}

fn three_pairs() -> Vec<Value> {
    vec![
        pair("p1", "BTC/USDT", 0.3, 1000.0),
        pair("p2", "ETH/USDT", 1.2, 500.0),
        pair("p3", "SOL/USDT", 4.5, 250.0),
    ]
}

fn script_backend(mock: &MockTransport, license: Value, settings: Value) {
    use HttpMethod::{Delete, Get, Post, Put};

    mock.set(
        Get,
        "/users/u1",
        MockReply::ok(json!({
            "success": true,
            "user": {
                "telegram_id": "u1",
                "username": "alice",
                "license": license.clone(),
                "settings": settings
            }
        })),
    );
    mock.set(Put, "/users/u1/last_active", MockReply::ok(json!({"success": true})));
    mock.set(
        Get,
        "/exchanges",
        MockReply::ok(json!([
            {"symbol": "binance", "name": "Binance", "is_active": true},
            {"symbol": "okx", "name": "OKX", "is_active": true}
        ])),
    );
    mock.set(
        Get,
        "/coins",
        MockReply::ok(json!([
            {"symbol": "BTC", "name": "Bitcoin", "is_active": true},
            {"symbol": "ETH", "name": "Ethereum", "is_active": true},
            {"symbol": "DOGE", "name": "Dogecoin", "is_active": false}
        ])),
    );
    mock.set(
        Get,
        "/users/u1/license",
        MockReply::ok(json!({"success": true, "license": license})),
    );
    mock.set(Get, "/pairs", pairs_body(three_pairs()));
    mock.set(Put, "/users/u1/settings", MockReply::ok(json!({"success": true})));
    mock.set(Post, "/pairs/p1/pin", MockReply::ok(json!({"success": true})));
    mock.set(Delete, "/pairs/p2/pin", MockReply::ok(json!({"success": true})));
}

/// Process events until `done` holds. Time is paused, so timers fire as
/// soon as the runtime is idle.
async fn pump_until(app: &mut Application, what: &str, mut done: impl FnMut(&Application) -> bool) {
    for _ in 0..2_000 {
        if done(app) {
            return;
        }
        match tokio::time::timeout(Duration::from_secs(600), app.next_event()).await {
            Ok(Some(event)) => app.handle_event(event).await,
            _ => break,
        }
    }
    assert!(done(app), "never reached: {what}");
}

async fn pump_events(app: &mut Application, count: usize) {
    for _ in 0..count {
        match tokio::time::timeout(Duration::from_secs(600), app.next_event()).await {
            Ok(Some(event)) => app.handle_event(event).await,
            _ => break,
        }
    }
}

async fn started(license: Value, settings: Value) -> (Arc<MockTransport>, Application, Screen) {
    let mock = Arc::new(MockTransport::new());
    script_backend(&mock, license, settings);
    let (mut app, screen) = build(&mock, user_u1());
    app.start_session().await;
    (mock, app, screen)
}

fn has_notice(app: &Application, text: &str) -> bool {
    app.notices().any(|n| n.message.contains(text))
}

fn settings_writes(mock: &MockTransport) -> Vec<Value> {
    mock.calls_to(HttpMethod::Put, "/users/u1/settings")
        .into_iter()
        .filter_map(|req| req.body)
        .collect()
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_start_applies_settings_and_renders_pairs() {
    let (_mock, mut app, screen) = started(
        pro(),
        json!({"view_mode": "grid", "sort_field": "spread", "sort_order": "desc"}),
    )
    .await;

    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    assert_eq!(app.scheduler().mode(), ViewMode::Grid);
    let ids: Vec<_> = app.store().filtered().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p3", "p2", "p1"]);
    assert!(app.store().find("p2").unwrap().is_pinned);
    assert_eq!(app.reference().coins.len(), 2, "inactive coins are not offered");

    let text = screen.text();
    assert!(text.contains("user: alice"));
    assert!(text.contains("## #1 SOL/USDT"));
    assert!(text.contains("pairs: 3 | max spread: 4.50%"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_identity_shows_auth_screen_until_retry() {
    let mock = Arc::new(MockTransport::new());
    let identity = Arc::new(SwitchableIdentity::default());
    let (mut app, screen) = build(&mock, identity.clone());

    app.start_session().await;

    assert!(app.session().is_none());
    assert!(app.auth_error().is_some());
    assert!(screen.text().contains("Authentication required"));
    assert!(mock.calls().is_empty());

    app.handle_line("view grid").await;
    assert!(has_notice(&app, "Authentication required"));

    *identity.0.lock() = Some(Identity::new("u1", Some("alice".to_string())));
    script_backend(&mock, pro(), json!({}));
    app.handle_line("retry").await;

    assert!(app.auth_error().is_none());
    assert_eq!(app.session().map(|s| s.user_id()), Some("u1"));
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_lookup_and_creation_require_auth() {
    let mock = Arc::new(MockTransport::new());
    mock.set(HttpMethod::Get, "/users/u1", MockReply::status(404));
    mock.set(HttpMethod::Post, "/users/u1", MockReply::status(500));
    let (mut app, _screen) = build(&mock, user_u1());

    app.start_session().await;

    assert!(app.session().is_none());
    assert!(app.auth_error().unwrap().contains("creation failed"));
    assert_eq!(mock.call_count(HttpMethod::Post, "/users/u1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_once_prints_one_frame() {
    let mock = Arc::new(MockTransport::new());
    script_backend(&mock, pro(), json!({}));
    let (mut app, screen) = build(&mock, user_u1());

    app.run_once().await.unwrap();

    assert_eq!(mock.call_count(HttpMethod::Get, "/pairs"), 1);
    assert!(screen.text().contains("pairs: 3"));
}

// ============================================================================
// License gating
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_free_license_never_fetches_pairs() {
    let (mock, mut app, screen) = started(free(), json!({})).await;

    // Two fetch intervals' worth of ticks.
    pump_events(&mut app, 25).await;

    assert_eq!(mock.call_count(HttpMethod::Get, "/pairs"), 0);
    assert!(app.store().raw().is_empty());
    assert_eq!(app.gate().access(), Access::Free);
    assert!(screen.text().contains("Free license does not include"));
}

#[tokio::test(start_paused = true)]
async fn test_downgrade_clears_pairs_and_notifies() {
    let (mock, mut app, _screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    mock.set(
        HttpMethod::Get,
        "/users/u1/license",
        MockReply::ok(json!({"success": true, "license": free()})),
    );
    pump_until(&mut app, "pairs cleared", |app| app.store().raw().is_empty()).await;

    assert_eq!(app.gate().access(), Access::Free);
    assert!(has_notice(&app, "changed to Free"));
    assert!(has_notice(&app, "Purchase a license"));
}

#[tokio::test(start_paused = true)]
async fn test_regained_access_fetches_immediately() {
    let inactive = json!({"type": "Pro", "is_active": false});
    let (mock, mut app, _screen) = started(inactive, json!({})).await;
    assert_eq!(app.gate().access(), Access::Inactive);

    mock.set(
        HttpMethod::Get,
        "/users/u1/license",
        MockReply::ok(json!({"success": true, "license": pro()})),
    );
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    assert!(has_notice(&app, "activated"));
}

// ============================================================================
// Commands and settings
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sort_command_reorders_and_persists_immediately() {
    let (mock, mut app, _screen) = started(pro(), json!({"view_mode": "grid"})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("sort coin asc").await;

    let coins: Vec<_> = app.store().filtered().iter().map(|p| p.coin()).collect();
    assert_eq!(coins, vec!["BTC", "ETH", "SOL"]);

    pump_until(&mut app, "settings written", |_| !settings_writes(&mock).is_empty()).await;
    let body = &settings_writes(&mock)[0];
    assert_eq!(body["sort_field"], json!("coin"));
    assert_eq!(body["sort_order"], json!("asc"));
    assert_eq!(body["view_mode"], json!("grid"), "previous settings are merged in");

    pump_until(&mut app, "cache updated", |app| {
        app.settings().unwrap().current().sort_field == Some(SortField::Coin)
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_range_changes_are_debounced() {
    let (mock, mut app, _screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("spread 1 5").await;
    app.handle_line("spread 1 3").await;

    assert_eq!(app.store().filtered().len(), 1);
    assert!(settings_writes(&mock).is_empty());

    pump_until(&mut app, "debounced write", |_| !settings_writes(&mock).is_empty()).await;
    pump_events(&mut app, 5).await;

    let writes = settings_writes(&mock);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0]["spread_min"], json!(1.0));
    assert_eq!(writes[0]["spread_max"], json!(3.0));
}

#[tokio::test(start_paused = true)]
async fn test_tag_toggle_validates_symbols() {
    let (mock, mut app, _screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("coin btc").await;
    assert_eq!(app.store().filtered().len(), 1);
    assert_eq!(app.store().filtered()[0].id, "p1");

    app.handle_line("coin DOGE").await;
    assert!(has_notice(&app, "Unknown symbol DOGE"));

    pump_until(&mut app, "selection written", |_| !settings_writes(&mock).is_empty()).await;
    assert_eq!(settings_writes(&mock)[0]["selected_coins"], json!(["BTC"]));

    app.handle_line("coin all").await;
    assert_eq!(app.store().filtered().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_list_view_falls_back_on_narrow_display() {
    let (_mock, mut app, _screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("view list").await;
    assert_eq!(app.scheduler().mode(), ViewMode::List);

    app.handle_line("width 80").await;
    assert_eq!(app.scheduler().mode(), ViewMode::Grid);

    app.handle_line("view list").await;
    assert_eq!(app.scheduler().mode(), ViewMode::Grid);
    assert!(has_notice(&app, "List view needs at least 100 columns"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_full_settings() {
    let (mock, mut app, _screen) = started(pro(), json!({"theme": "dark"})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("interval 30").await;
    assert_eq!(app.interval_secs(), 30);

    app.shutdown().await;

    let writes = settings_writes(&mock);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0]["update_interval"], json!(30));
    let last = writes.last().unwrap();
    assert_eq!(last["update_interval"], json!(30));
    assert_eq!(last["view_mode"], json!("treemap"));
    assert_eq!(last["time_max"], json!(1440.0));
    assert_eq!(last["theme"], json!("dark"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_never_saved() {
    let (mock, mut app, _screen) = started(pro(), json!({"update_interval": 20})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("interval 0").await;
    assert_eq!(app.interval_secs(), 0);
    pump_events(&mut app, 3).await;
    assert!(settings_writes(&mock).is_empty());

    app.shutdown().await;

    let writes = settings_writes(&mock);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0]["update_interval"], json!(20));
}

// ============================================================================
// Pins, details and reset
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pin_toggles_by_state_then_refetches() {
    let (mock, mut app, _screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;
    mock.clear_calls();

    app.handle_line("pin p1").await;
    app.handle_line("pin p2").await;

    pump_until(&mut app, "refetch", |_| {
        mock.call_count(HttpMethod::Get, "/pairs") > 0
    })
    .await;

    assert_eq!(mock.call_count(HttpMethod::Post, "/pairs/p1/pin"), 1);
    assert_eq!(mock.call_count(HttpMethod::Delete, "/pairs/p2/pin"), 1);
    assert!(has_notice(&app, "Pin status changed"));
}

#[tokio::test(start_paused = true)]
async fn test_details_overlay_closes_when_pair_disappears() {
    let (mock, mut app, screen) = started(pro(), json!({})).await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;

    app.handle_line("details #1").await;
    assert_eq!(app.overlay().pair_id(), Some("p3"));
    assert!(screen.text().contains("== SOL/USDT (TRC20) =="));

    mock.set(
        HttpMethod::Get,
        "/pairs",
        pairs_body(vec![pair("p1", "BTC/USDT", 0.3, 1000.0)]),
    );
    app.handle_line("refresh").await;
    pump_until(&mut app, "overlay closed", |app| !app.overlay().is_open()).await;

    assert!(has_notice(&app, "no longer listed"));
}

#[tokio::test(start_paused = true)]
async fn test_reset_lifts_endpoint_cooldown() {
    let mock = Arc::new(MockTransport::new());
    script_backend(&mock, pro(), json!({}));
    mock.set(HttpMethod::Get, "/pairs", MockReply::status(500));
    let (mut app, _screen) = build(&mock, user_u1());
    app.start_session().await;

    pump_until(&mut app, "fetch failed", |app| has_notice(app, "Failed to load data")).await;
    assert_eq!(mock.call_count(HttpMethod::Get, "/pairs"), 1);

    app.handle_line("refresh").await;
    pump_events(&mut app, 1).await;
    assert_eq!(
        mock.call_count(HttpMethod::Get, "/pairs"),
        1,
        "cooling endpoint is not contacted"
    );

    mock.set(HttpMethod::Get, "/pairs", pairs_body(three_pairs()));
    app.handle_line("reset").await;
    pump_until(&mut app, "pairs loaded", |app| app.store().raw().len() == 3).await;
    assert_eq!(mock.call_count(HttpMethod::Get, "/pairs"), 2);
}
