//! Main application orchestration.
//!
//! One task owns all mutable state and processes [`AppEvent`]s in order.
//! Network calls and timers run as spawned tasks that report back over the
//! event channel, so state only changes between events.

use cexscan_api::{
    ApiClient, ApiResult, DynTransport, PairsResponse, ReqwestTransport, RetryingHttpClient,
    SettingsWriteOutcome,
};
use cexscan_core::{FilterCriteria, SortCriteria, TagKind, TradingPair, UserSettings};
use cexscan_dashboard::{
    render_auth_required, render_frame, DataStore, DetailsOverlay, DetailsRefresh, Notice,
    RenderContext, RenderScheduler,
};
use cexscan_session::{
    bootstrap, load_reference_data, IdentityProvider, KeyedTasks, LicenseGate, LicenseUpdate,
    ReferenceData, Session, SessionResult, SettingsSync,
};
use cexscan_telemetry::Metrics;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{self, Command, PairRef, RangeKind, HELP};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

const FETCH_TIMER: &str = "timer:fetch";
const LABEL_TIMER: &str = "timer:labels";
const LICENSE_TIMER: &str = "timer:license";
const DETAILS_TIMER: &str = "timer:details";
const PIN_REFETCH: &str = "pin:refetch";

/// Delay between a pin toggle and the refetch that shows it.
const PIN_REFETCH_DELAY: Duration = Duration::from_millis(300);
const DETAILS_TICK: Duration = Duration::from_secs(1);
const MAX_NOTICES: usize = 3;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Everything the event loop reacts to.
pub enum AppEvent {
    /// Raw stdin line.
    Input(String),
    /// Poll timer fired or a refetch was requested.
    Fetch,
    PairsFetched(ApiResult<PairsResponse>),
    LicenseUpdated(LicenseUpdate),
    PinToggled {
        pair_id: String,
        pinned: bool,
        result: ApiResult<()>,
    },
    SettingsSaved(SettingsWriteOutcome),
    Notifications(ApiResult<Vec<Value>>),
    LabelTick,
    DetailsTick,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    api: ApiClient,
    identity: Arc<dyn IdentityProvider>,
    gate: Arc<LicenseGate>,
    tasks: KeyedTasks,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    shutdown: CancellationToken,

    session: Option<Session>,
    settings: Option<SettingsSync>,
    reference: ReferenceData,
    /// Set while the authentication screen is shown.
    auth_error: Option<String>,

    store: DataStore,
    scheduler: RenderScheduler,
    overlay: DetailsOverlay,
    interval_secs: u64,
    notices: VecDeque<Notice>,
    /// Help, metrics or notifications text shown below the frame until the
    /// next command.
    panel: Option<String>,

    output: Box<dyn Write + Send>,
    clear_screen: bool,
}

impl Application {
    /// Create an application talking to the configured API over HTTPS.
    pub fn from_config(config: AppConfig, identity: Arc<dyn IdentityProvider>) -> AppResult<Self> {
        let transport: DynTransport = Arc::new(ReqwestTransport::new()?);
        Self::new(config, transport, identity)
    }

    pub fn new(
        config: AppConfig,
        transport: DynTransport,
        identity: Arc<dyn IdentityProvider>,
    ) -> AppResult<Self> {
        config.validate()?;
        let http = Arc::new(RetryingHttpClient::new(transport, config.retry_config()));
        let api = ApiClient::new(&config.api_url, http)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            gate: Arc::new(LicenseGate::new(config.license_gate_config())),
            tasks: KeyedTasks::new(),
            shutdown: CancellationToken::new(),
            session: None,
            settings: None,
            reference: ReferenceData::default(),
            auth_error: None,
            store: DataStore::default(),
            scheduler: RenderScheduler::new(config.dashboard.clone()),
            overlay: DetailsOverlay::new(),
            interval_secs: config.dashboard.default_interval_secs,
            notices: VecDeque::new(),
            panel: None,
            output: Box::new(std::io::stdout()),
            clear_screen: false,
            config,
            api,
            identity,
            events_tx,
            events_rx,
        })
    }

    /// Redirect frames to `output`, optionally clearing the screen before each.
    pub fn with_output(mut self, output: Box<dyn Write + Send>, clear_screen: bool) -> Self {
        self.output = output;
        self.clear_screen = clear_screen;
        self
    }

    /// Cancelling this token ends [`Application::run`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn overlay(&self) -> &DetailsOverlay {
        &self.overlay
    }

    pub fn gate(&self) -> &LicenseGate {
        &self.gate
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> Option<&SettingsSync> {
        self.settings.as_ref()
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Run until quit or the shutdown token is cancelled.
    pub async fn run(&mut self) -> AppResult<()> {
        info!("Starting application");
        self.spawn_stdin_reader();
        self.start_session().await;

        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.events_rx.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            self.handle_event(event).await;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Bootstrap, check the license, fetch once and print one frame.
    pub async fn run_once(&mut self) -> AppResult<()> {
        if let Err(e) = self.establish_session().await {
            self.auth_error = Some(e.to_string());
            self.draw();
            return Err(AppError::Session(e));
        }
        if let Some(session) = &self.session {
            let user_id = session.user_id().to_string();
            if let Some(update) = self.gate.poll(&self.api, &user_id).await {
                self.apply_license_update(update);
            }
            if self.gate.has_access() {
                let result = self.api.get_pairs(Some(&user_id)).await;
                self.handle_pairs(result);
                return Ok(());
            }
        }
        self.render();
        Ok(())
    }

    /// Next event from spawned tasks and timers.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events_rx.recv().await
    }

    /// Stop timers and save the full settings.
    pub async fn shutdown(&mut self) {
        self.tasks.cancel_all();
        let Some(settings) = self.settings.clone() else {
            return;
        };
        let outcome = settings.flush(self.full_settings()).await;
        info!(outcome = outcome.as_str(), "Settings flushed on shutdown");
    }

    /// Bootstrap the session and start the timers, or show the
    /// authentication screen.
    pub async fn start_session(&mut self) {
        match self.establish_session().await {
            Ok(()) => {
                self.auth_error = None;
                self.start_timers();
                if !self.request_fetch() {
                    self.render();
                }
            }
            Err(e) => {
                warn!(error = %e, "Authentication required");
                self.auth_error = Some(e.to_string());
                self.draw();
            }
        }
    }

    async fn establish_session(&mut self) -> SessionResult<()> {
        let session = bootstrap(&self.api, self.identity.as_ref()).await?;
        self.reference = load_reference_data(&self.api).await;

        if let Some(license) = session.user.license.clone() {
            self.gate.observe(license);
        }

        let saved = session.user.settings.clone();
        let view = saved.view_mode.unwrap_or(self.config.dashboard.default_view);
        self.scheduler.set_mode(view);
        self.interval_secs = saved
            .update_interval
            .unwrap_or(self.config.dashboard.default_interval_secs);
        self.store = DataStore::new(
            FilterCriteria::from_settings(&saved),
            saved.sort().unwrap_or_default(),
        );

        self.settings = Some(SettingsSync::new(
            self.api.clone(),
            session.user_id(),
            saved,
            self.config.debounce(),
        ));
        info!(
            user = session.display_name(),
            view = %self.scheduler.mode(),
            interval_secs = self.interval_secs,
            exchanges = self.reference.exchanges.len(),
            coins = self.reference.coins.len(),
            "Session ready"
        );
        self.session = Some(session);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn start_timers(&self) {
        self.spawn_ticker(LABEL_TIMER, self.config.dashboard.label_tick(), || {
            AppEvent::LabelTick
        });
        self.restart_fetch_timer();
        self.restart_license_poll();
    }

    fn spawn_ticker(&self, key: &str, period: Duration, event: fn() -> AppEvent) {
        let tx = self.events_tx.clone();
        self.tasks.spawn(key, async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(event()).is_err() {
                    break;
                }
            }
        });
    }

    fn restart_fetch_timer(&self) {
        if self.interval_secs == 0 {
            self.tasks.cancel(FETCH_TIMER);
            debug!("Polling disabled");
            return;
        }
        self.spawn_ticker(FETCH_TIMER, Duration::from_secs(self.interval_secs), || {
            AppEvent::Fetch
        });
    }

    /// Check now, then again after the gate's current delay.
    fn restart_license_poll(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let user_id = session.user_id().to_string();
        let gate = self.gate.clone();
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        self.tasks.spawn(LICENSE_TIMER, async move {
            loop {
                if let Some(update) = gate.poll(&api, &user_id).await {
                    if tx.send(AppEvent::LicenseUpdated(update)).is_err() {
                        break;
                    }
                }
                tokio::time::sleep(gate.next_check_delay()).await;
            }
        });
    }

    fn spawn_stdin_reader(&self) {
        let tx = self.events_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    () = shutdown.cancelled() => break,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        if tx.send(AppEvent::Input(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Input(line) => self.handle_line(&line).await,
            AppEvent::Fetch => {
                if !self.request_fetch() {
                    self.render();
                }
            }
            AppEvent::PairsFetched(result) => self.handle_pairs(result),
            AppEvent::LicenseUpdated(update) => {
                self.apply_license_update(update);
                self.render();
            }
            AppEvent::PinToggled {
                pair_id,
                pinned,
                result,
            } => self.handle_pin_result(pair_id, pinned, result),
            AppEvent::SettingsSaved(outcome) => {
                if let SettingsWriteOutcome::Rejected(reason)
                | SettingsWriteOutcome::Failed(reason) = outcome
                {
                    self.notify(Notice::warning(format!("Settings were not saved: {reason}")));
                    self.draw();
                }
            }
            AppEvent::Notifications(result) => self.handle_notifications(result),
            AppEvent::LabelTick => {
                if self.scheduler.tick_labels(Utc::now()) {
                    self.draw();
                }
            }
            AppEvent::DetailsTick => {
                if self.overlay.is_open() {
                    self.draw();
                }
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) {
        match commands::parse(line) {
            Ok(Some(command)) => self.handle_command(command).await,
            Ok(None) => {}
            Err(e) => {
                self.notify(Notice::warning(e.to_string()));
                self.draw();
            }
        }
    }

    pub async fn handle_command(&mut self, command: Command) {
        self.panel = None;
        match command {
            Command::Quit => {
                self.shutdown.cancel();
                return;
            }
            Command::Help => {
                self.panel = Some(HELP.to_string());
                self.draw();
                return;
            }
            Command::Metrics => {
                match Metrics::render_text() {
                    Ok(text) => self.panel = Some(text),
                    Err(e) => self.notify(Notice::error(e.to_string())),
                }
                self.draw();
                return;
            }
            Command::Retry => {
                if self.session.is_none() {
                    self.start_session().await;
                } else {
                    self.draw();
                }
                return;
            }
            _ if self.session.is_none() => {
                self.notify(Notice::warning("Authentication required"));
                self.draw();
                return;
            }
            _ => {}
        }

        let now = Utc::now();
        match command {
            Command::View(requested) => {
                let mode = self.scheduler.set_mode(requested);
                if mode != requested {
                    self.notify(Notice::warning(format!(
                        "List view needs at least {} columns; showing {mode}",
                        self.config.dashboard.list_min_width
                    )));
                }
                self.persist_now(UserSettings {
                    view_mode: Some(mode),
                    ..Default::default()
                });
            }
            Command::Sort(sort) => {
                self.store.set_sort(sort, now);
                self.persist_now(sort_patch(sort));
            }
            Command::Interval(secs) => {
                self.interval_secs = secs;
                self.restart_fetch_timer();
                // Zero pauses polling for this session only.
                if secs > 0 {
                    self.persist_now(UserSettings {
                        update_interval: Some(secs),
                        ..Default::default()
                    });
                }
            }
            Command::Range { kind, min, max } => {
                let mut criteria = self.store.criteria().clone();
                match kind {
                    RangeKind::Spread => criteria.spread.set(min, max),
                    RangeKind::Volume => criteria.volume.set(min, max),
                    RangeKind::Age => criteria.age_secs.set(min * 60.0, max * 60.0),
                }
                let patch = criteria.ranges_patch();
                self.store.set_criteria(criteria, now);
                if let Some(settings) = &self.settings {
                    settings.persist_debounced(kind.key(), patch);
                }
            }
            Command::Tag { kind, symbol } => {
                if !self.apply_tag(kind, symbol, now) {
                    self.draw();
                    return;
                }
            }
            Command::Pin(target) => {
                self.toggle_pin(&target);
                self.draw();
                return;
            }
            Command::Details(target) => {
                match self.resolve(&target).cloned() {
                    Some(pair) => {
                        self.overlay.open(pair);
                        self.spawn_ticker(DETAILS_TIMER, DETAILS_TICK, || AppEvent::DetailsTick);
                    }
                    None => {
                        self.notify(Notice::warning(format!("No pair {}", describe(&target))));
                    }
                }
                self.draw();
                return;
            }
            Command::Close => {
                self.close_details();
                self.draw();
                return;
            }
            Command::Width(cols) => {
                if let Some(mode) = self.scheduler.set_display_width(cols) {
                    self.notify(Notice::info(format!(
                        "Display too narrow for list view; showing {mode}"
                    )));
                }
            }
            Command::Refresh => {
                if self.request_fetch() {
                    self.draw();
                    return;
                }
            }
            Command::Reset => {
                self.api.http().reset_all();
                self.gate.reset_backoff();
                self.restart_license_poll();
                self.notify(Notice::info("Connection state reset"));
                if self.request_fetch() {
                    self.draw();
                    return;
                }
            }
            Command::Notifications => {
                self.request_notifications();
                return;
            }
            Command::Quit | Command::Help | Command::Metrics | Command::Retry => {}
        }
        self.render();
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    /// Start a pair fetch. Returns false when access is denied; the store is
    /// emptied instead.
    fn request_fetch(&mut self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !self.gate.has_access() {
            debug!(access = %self.gate.access(), "Fetch skipped");
            self.store.clear();
            return false;
        }
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let user_id = session.user_id().to_string();
        tokio::spawn(async move {
            let result = api.get_pairs(Some(&user_id)).await;
            let _ = tx.send(AppEvent::PairsFetched(result));
        });
        true
    }

    fn handle_pairs(&mut self, result: ApiResult<PairsResponse>) {
        match result {
            Ok(response) if !self.gate.has_access() => {
                debug!(
                    discarded = response.active_pairs.len(),
                    "Access lost while fetching"
                );
                self.store.clear();
                self.close_details();
            }
            Ok(response) => {
                if response.active_pairs.is_empty() {
                    self.notify(Notice::warning("No active pairs"));
                }
                self.store
                    .replace(response.active_pairs, &response.pinned_pairs, Utc::now());
                if self.overlay.refresh(&self.store) == DetailsRefresh::Closed {
                    self.tasks.cancel(DETAILS_TIMER);
                    self.notify(Notice::info("The pair in the details view is no longer listed"));
                }
            }
            Err(e) if e.is_cooling_down() => {
                debug!(error = %e, "Pairs endpoint cooling down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch pairs");
                self.notify(Notice::error("Failed to load data"));
            }
        }
        self.render();
    }

    fn apply_license_update(&mut self, update: LicenseUpdate) {
        for notice in Notice::for_license_change(update.change) {
            self.notify(notice);
        }
        if update.access_lost() {
            info!(access = %update.access_after, "Access lost, clearing pairs");
            self.store.clear();
            self.close_details();
        }
        if update.access_gained() {
            info!("Access granted, fetching pairs");
            self.request_fetch();
        }
    }

    /// Returns false if nothing changed.
    fn apply_tag(&mut self, kind: TagKind, symbol: Option<String>, now: DateTime<Utc>) -> bool {
        let mut criteria = self.store.criteria().clone();
        match symbol {
            None => criteria.select_all(kind),
            Some(symbol) => {
                let Some(symbol) = self.canonical_symbol(kind, &symbol) else {
                    self.notify(Notice::warning(format!("Unknown symbol {symbol}")));
                    return false;
                };
                criteria.toggle(kind, &symbol);
            }
        }
        let patch = criteria.selections_patch();
        self.store.set_criteria(criteria, now);
        self.persist_now(patch);
        true
    }

    /// Match `symbol` against the active reference list for `kind`. An empty
    /// list accepts any symbol as typed.
    fn canonical_symbol(&self, kind: TagKind, symbol: &str) -> Option<String> {
        let items = match kind {
            TagKind::Coin => &self.reference.coins,
            TagKind::BuyExchange | TagKind::SellExchange => &self.reference.exchanges,
        };
        if items.is_empty() {
            return Some(symbol.to_string());
        }
        items
            .iter()
            .find(|item| item.symbol.eq_ignore_ascii_case(symbol))
            .map(|item| item.symbol.clone())
    }

    fn resolve(&self, target: &PairRef) -> Option<&TradingPair> {
        match target {
            PairRef::Position(position) => {
                let id = self.scheduler.visible_at(*position)?.id.as_str();
                self.store.find(id)
            }
            PairRef::Id(id) => self.store.find(id),
        }
    }

    fn toggle_pin(&mut self, target: &PairRef) {
        let Some(user_id) = self.session.as_ref().map(|s| s.user_id().to_string()) else {
            return;
        };
        let Some(pair) = self.resolve(target) else {
            self.notify(Notice::warning(format!("No pair {}", describe(target))));
            return;
        };
        let pair_id = pair.id.clone();
        let pinned = pair.is_pinned;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = if pinned {
                api.unpin_pair(&pair_id, &user_id).await
            } else {
                api.pin_pair(&pair_id, &user_id).await
            };
            let _ = tx.send(AppEvent::PinToggled {
                pair_id,
                pinned: !pinned,
                result,
            });
        });
    }

    fn handle_pin_result(&mut self, pair_id: String, pinned: bool, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                info!(pair_id = %pair_id, pinned, "Pin status changed");
                self.notify(Notice::success("Pin status changed"));
                let tx = self.events_tx.clone();
                self.tasks.spawn_after(PIN_REFETCH, PIN_REFETCH_DELAY, async move {
                    let _ = tx.send(AppEvent::Fetch);
                });
            }
            Err(e) => {
                warn!(pair_id = %pair_id, error = %e, "Failed to change pin status");
                self.notify(Notice::error("Failed to change pin status"));
            }
        }
        self.draw();
    }

    fn request_notifications(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let user_id = session.user_id().to_string();
        tokio::spawn(async move {
            let result = api.get_notifications(&user_id).await;
            let _ = tx.send(AppEvent::Notifications(result));
        });
    }

    fn handle_notifications(&mut self, result: ApiResult<Vec<Value>>) {
        match result {
            Ok(items) => {
                let mut text = format!("Notifications ({}):\n", items.len());
                for item in &items {
                    let line = match item.get("message").and_then(Value::as_str) {
                        Some(message) => message.to_string(),
                        None => item.to_string(),
                    };
                    let _ = writeln!(text, "  - {line}");
                }
                self.panel = Some(text);
            }
            Err(e) => {
                warn!(error = %e, "Failed to load notifications");
                self.notify(Notice::error("Failed to load notifications"));
            }
        }
        self.draw();
    }

    fn close_details(&mut self) {
        self.overlay.close();
        self.tasks.cancel(DETAILS_TIMER);
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    fn persist_now(&self, patch: UserSettings) {
        let Some(settings) = self.settings.clone() else {
            return;
        };
        let tx = self.events_tx.clone();
        settings.persist_in_background(patch, move |outcome| {
            let _ = tx.send(AppEvent::SettingsSaved(outcome));
        });
    }

    /// Every setting the client controls, as currently shown.
    fn full_settings(&self) -> UserSettings {
        let criteria = self.store.criteria();
        UserSettings {
            view_mode: Some(self.scheduler.mode()),
            update_interval: (self.interval_secs > 0).then_some(self.interval_secs),
            ..sort_patch(self.store.sort())
        }
        .merged_with(&criteria.ranges_patch())
        .merged_with(&criteria.selections_patch())
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    fn notify(&mut self, notice: Notice) {
        info!(level = %notice.level, message = %notice.message, "Notice");
        self.notices.push_back(notice);
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    /// Rebuild the frame from the store and draw it.
    fn render(&mut self) {
        if let Some(session) = &self.session {
            let license = self.gate.license();
            let ctx = RenderContext {
                user: session.display_name(),
                license: license.as_ref(),
                interval_secs: self.interval_secs,
            };
            self.scheduler.render(&self.store, ctx, Utc::now());
        }
        self.draw();
    }

    /// Draw the current frame, overlay, notices and panel.
    fn draw(&mut self) {
        let mut screen = String::new();
        if self.clear_screen {
            screen.push_str(CLEAR_SCREEN);
        }
        if let Some(reason) = &self.auth_error {
            screen.push_str(&render_auth_required(reason));
        } else if let Some(frame) = self.scheduler.frame() {
            screen.push_str(&render_frame(frame, self.scheduler.display_width()));
        }
        if let Some(details) = self.overlay.render(Utc::now()) {
            screen.push('\n');
            screen.push_str(&details);
        }
        if let Some(panel) = &self.panel {
            screen.push('\n');
            screen.push_str(panel);
        }
        if !self.notices.is_empty() {
            screen.push('\n');
            for notice in &self.notices {
                let _ = writeln!(screen, "{notice}");
            }
        }
        if let Err(e) = self
            .output
            .write_all(screen.as_bytes())
            .and_then(|()| self.output.flush())
        {
            warn!(error = %e, "Failed to write frame");
        }
    }
}

fn sort_patch(sort: SortCriteria) -> UserSettings {
    UserSettings {
        sort_field: Some(sort.field),
        sort_order: Some(sort.order),
        ..Default::default()
    }
}

fn describe(target: &PairRef) -> String {
    match target {
        PairRef::Position(position) => format!("#{position}"),
        PairRef::Id(id) => id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cexscan_core::{SortField, SortOrder, ViewMode};

    #[test]
    fn test_sort_patch_sets_both_halves() {
        let patch = sort_patch(SortCriteria::new(SortField::Coin, SortOrder::Asc));
        assert_eq!(
            patch.sort(),
            Some(SortCriteria::new(SortField::Coin, SortOrder::Asc))
        );
        assert_eq!(patch.view_mode, None);
    }

    #[test]
    fn test_describe_pair_ref() {
        assert_eq!(describe(&PairRef::Position(3)), "#3");
        assert_eq!(describe(&PairRef::Id("abc".to_string())), "abc");
    }

    #[test]
    fn test_full_settings_cover_client_fields() {
        let app = Application::new(
            AppConfig::default(),
            Arc::new(cexscan_api::MockTransport::new()),
            Arc::new(cexscan_session::StaticIdentity(None)),
        )
        .unwrap();

        let full = app.full_settings();

        assert_eq!(full.view_mode, Some(ViewMode::Treemap));
        assert_eq!(full.update_interval, Some(10));
        assert_eq!(full.sort(), Some(SortCriteria::default()));
        assert_eq!(full.spread_max, Some(100.0));
        assert_eq!(full.time_max, Some(1440.0));
        assert_eq!(full.selected_coins, Some(Vec::new()));
    }
}
