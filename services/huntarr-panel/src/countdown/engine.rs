//! Engine: drives the countdown board from timers and fetches

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::board::{CountdownBoard, TickOutcome};
use super::source::CycleSource;
use super::timer::TimerCell;
use crate::apps::TrackedApp;
use crate::clock::Clock;
use crate::config::CountdownConfig;
use crate::cycle::{CycleRecord, CycleSnapshot};
use crate::endpoints::Endpoints;
use crate::io::HttpClient;
use crate::PanelError;

/// Thread-safe board handle
pub type BoardHandle = Arc<RwLock<CountdownBoard>>;

/// One activation of the countdown, from `initialize()` to `cleanup()`.
///
/// Everything a session learns dies with it; re-initialising never reuses a
/// previous session's snapshot.
struct Session {
    board: BoardHandle,
    source: CycleSource,
    clock: Arc<dyn Clock>,
    timing: CountdownConfig,
    cancel: CancellationToken,
    fetch_gate: tokio::sync::Mutex<()>,
    fetch_generation: AtomicU64,
    latest: RwLock<Option<Arc<CycleSnapshot>>>,
    failures: AtomicU64,
    resets: Mutex<HashMap<TrackedApp, CancellationToken>>,
}

impl Session {
    fn is_fetching(&self) -> bool {
        self.fetch_gate.try_lock().is_err()
    }

    /// Single-flight refresh of the shared cycle state.
    ///
    /// A caller that arrives while a fetch is in flight waits for it and gets
    /// the same snapshot instead of issuing a second request.
    async fn refresh(self: &Arc<Self>) -> Option<Arc<CycleSnapshot>> {
        let observed = self.fetch_generation.load(Ordering::Acquire);
        let _in_flight = self.fetch_gate.lock().await;
        if self.fetch_generation.load(Ordering::Acquire) != observed {
            return self.latest.read().await.clone();
        }

        let result = match self.source.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let outcome = self
                    .board
                    .write()
                    .await
                    .apply_snapshot(&snapshot, self.clock.now());
                tracing::debug!(
                    "Applied cycle snapshot for {} apps (resets completed: {:?})",
                    snapshot.len(),
                    outcome.completed_resets
                );
                self.failures.store(0, Ordering::Relaxed);
                for app in outcome.completed_resets {
                    self.finish_reset(app);
                }
                for app in outcome.expired {
                    self.spawn_fallback(app);
                }
                *self.latest.write().await = Some(Arc::clone(&snapshot));
                Some(snapshot)
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                let mut board = self.board.write().await;
                if !board.has_snapshot() {
                    tracing::warn!("Cycle state unavailable: {}", e);
                    board.fetch_failed();
                } else if failures % 10 == 1 {
                    tracing::warn!(
                        "Cycle state refresh failed ({} consecutive): {}; keeping last snapshot",
                        failures,
                        e
                    );
                } else {
                    tracing::debug!("Cycle state refresh failed ({}): {}", failures, e);
                }
                drop(board);
                self.latest.read().await.clone()
            }
        };

        self.fetch_generation.fetch_add(1, Ordering::Release);
        result
    }

    async fn tick(self: &Arc<Self>, app: TrackedApp) {
        let outcome = self.board.write().await.tick(app, self.clock.now());
        if outcome == TickOutcome::Expired {
            tracing::debug!("Countdown for {} expired; refreshing", app);
            self.spawn_refresh_for(app);
            self.spawn_fallback(app);
        }
    }

    /// Refresh on behalf of an expired cell, retrying while another fetch is in flight
    fn spawn_refresh_for(self: &Arc<Self>, app: TrackedApp) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if !session.is_fetching() {
                    session.refresh().await;
                    return;
                }
                tracing::debug!("Fetch in flight; retrying refresh for {} shortly", app);
                tokio::select! {
                    _ = tokio::time::sleep(session.timing.fetch_retry()) => {}
                    _ = session.cancel.cancelled() => return,
                }
                if !session.board.read().await.is_refreshing(app) {
                    return;
                }
            }
        });
    }

    /// Revert a cell that is still refreshing once the fallback delay passes
    fn spawn_fallback(self: &Arc<Self>, app: TrackedApp) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(session.timing.refreshing_fallback()) => {}
                _ = session.cancel.cancelled() => return,
            }
            if session.board.write().await.refreshing_fallback(app) {
                tracing::debug!("No fresh schedule for {}; showing placeholder", app);
            }
        });
    }

    fn start_reset_poll(self: &Arc<Self>, app: TrackedApp) {
        let token = self.cancel.child_token();
        if let Ok(mut resets) = self.resets.lock() {
            if let Some(previous) = resets.insert(app, token.clone()) {
                previous.cancel();
            }
        }
        let session = Arc::clone(self);
        tokio::spawn(async move {
            poll_reset(session, app, token).await;
        });
    }

    fn finish_reset(&self, app: TrackedApp) {
        tracing::info!("Reset for {} observed; countdown resumed", app);
        if let Ok(mut resets) = self.resets.lock() {
            if let Some(token) = resets.remove(&app) {
                token.cancel();
            }
        }
    }
}

async fn poll_reset(session: Arc<Session>, app: TrackedApp, token: CancellationToken) {
    let max_attempts = session.timing.reset_poll_max_attempts;
    for attempt in 1..=max_attempts {
        tokio::select! {
            _ = tokio::time::sleep(session.timing.reset_poll_interval()) => {}
            _ = token.cancelled() => return,
        }
        session.refresh().await;
        if !session.board.read().await.is_waiting_for_reset(app) {
            return;
        }
        tracing::debug!(
            "Reset poll {}/{} for {}: schedule unchanged",
            attempt,
            max_attempts,
            app
        );
    }

    if token.is_cancelled() {
        return;
    }
    tracing::warn!(
        "Reset for {} not observed after {} polls; giving up",
        app,
        max_attempts
    );
    session.board.write().await.reset_timed_out(app);
}

async fn run_timer(session: Arc<Session>, app: TrackedApp) {
    let mut interval = tokio::time::interval(session.timing.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => session.tick(app).await,
            _ = session.cancel.cancelled() => {
                tracing::debug!("Timer for {} cancelled", app);
                break;
            }
        }
    }
}

async fn run_refresh_loop(session: Arc<Session>) {
    let mut interval = tokio::time::interval(session.timing.refresh_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // detached so teardown never interrupts a fetch mid-flight
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    session.refresh().await;
                });
            }
            _ = session.cancel.cancelled() => {
                tracing::debug!("Refresh loop cancelled");
                break;
            }
        }
    }
}

struct ActiveSession {
    session: Arc<Session>,
    timer_intervals: HashMap<TrackedApp, JoinHandle<()>>,
    refresh_loop: JoinHandle<()>,
}

/// The cycle countdown engine
pub struct CountdownEngine {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    clock: Arc<dyn Clock>,
    config: CountdownConfig,
    active: Mutex<Option<ActiveSession>>,
}

impl CountdownEngine {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        clock: Arc<dyn Clock>,
        config: CountdownConfig,
    ) -> Self {
        Self {
            http,
            endpoints,
            clock,
            config,
            active: Mutex::new(None),
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.lock_active()
            .as_ref()
            .map(|active| Arc::clone(&active.session))
    }

    /// Start from scratch: fresh cells, one timer per app, and the refresh loop
    pub fn initialize(&self) {
        self.cleanup();

        let session = Arc::new(Session {
            board: Arc::new(RwLock::new(CountdownBoard::new(&self.config.apps))),
            source: CycleSource::new(
                Arc::clone(&self.http),
                self.endpoints.clone(),
                Arc::clone(&self.clock),
                self.config.apps.clone(),
            ),
            clock: Arc::clone(&self.clock),
            timing: self.config.clone(),
            cancel: CancellationToken::new(),
            fetch_gate: tokio::sync::Mutex::new(()),
            fetch_generation: AtomicU64::new(0),
            latest: RwLock::new(None),
            failures: AtomicU64::new(0),
            resets: Mutex::new(HashMap::new()),
        });

        let timer_intervals = self
            .config
            .apps
            .iter()
            .map(|app| {
                let handle = tokio::spawn(run_timer(Arc::clone(&session), *app));
                (*app, handle)
            })
            .collect();
        let refresh_loop = tokio::spawn(run_refresh_loop(Arc::clone(&session)));

        *self.lock_active() = Some(ActiveSession {
            session,
            timer_intervals,
            refresh_loop,
        });
        tracing::info!(
            "Countdown engine initialized for {} apps",
            self.config.apps.len()
        );
    }

    /// Cancel every timer, the refresh loop and any reset poll.
    ///
    /// An in-flight fetch is left to finish against the discarded session.
    pub fn cleanup(&self) {
        let Some(active) = self.lock_active().take() else {
            return;
        };
        active.session.cancel.cancel();
        for (app, handle) in active.timer_intervals {
            tracing::debug!("Stopping timer for {}", app);
            handle.abort();
        }
        active.refresh_loop.abort();
        tracing::info!("Countdown engine stopped");
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Number of per-app timers currently scheduled
    pub fn timer_count(&self) -> usize {
        self.lock_active()
            .as_ref()
            .map(|active| {
                active
                    .timer_intervals
                    .values()
                    .filter(|handle| !handle.is_finished())
                    .count()
            })
            .unwrap_or(0)
    }

    /// True while the shared state fetch is in flight
    pub fn is_fetching(&self) -> bool {
        self.session().is_some_and(|session| session.is_fetching())
    }

    /// Current timer cells; all waiting when the engine is not active
    pub async fn cells(&self) -> Vec<TimerCell> {
        match self.session() {
            Some(session) => session.board.read().await.cells(),
            None => CountdownBoard::new(&self.config.apps).cells(),
        }
    }

    pub async fn cell(&self, app: TrackedApp) -> Option<TimerCell> {
        let session = self.session()?;
        let board = session.board.read().await;
        board.cell(app).cloned()
    }

    /// Refresh the shared state now (single-flight); `None` when inactive or nothing fetched yet
    pub async fn refresh(&self) -> Option<Arc<CycleSnapshot>> {
        let session = self.session()?;
        session.refresh().await
    }

    /// One app's record straight from the status API
    pub async fn cycle_status(&self, app: TrackedApp) -> crate::Result<CycleRecord> {
        CycleSource::new(
            Arc::clone(&self.http),
            self.endpoints.clone(),
            Arc::clone(&self.clock),
            self.config.apps.clone(),
        )
        .fetch_app(app)
        .await
    }

    /// Ask the backend to reset `app`'s cycle and wait for the new schedule
    pub async fn reset(&self, app: TrackedApp) -> crate::Result<()> {
        if !self.config.apps.contains(&app) {
            return Err(PanelError::InvalidArgument(format!(
                "{} is not tracked by the countdown",
                app
            )));
        }

        let Some(session) = self.session() else {
            tracing::info!("Reset requested for {} while countdown is inactive", app);
            return self.post_reset_intent(app).await;
        };

        let original = session.board.write().await.begin_reset(app).flatten();
        tracing::info!(
            "Reset requested for {} (current next cycle: {:?})",
            app,
            original
        );

        if let Err(e) = self.post_reset_intent(app).await {
            tracing::warn!("Reset intent for {} failed: {}", app, e);
            let outcome = session
                .board
                .write()
                .await
                .abandon_reset(app, self.clock.now());
            if outcome == TickOutcome::Expired {
                tracing::debug!("Countdown for {} expired during the reset attempt", app);
                session.spawn_refresh_for(app);
                session.spawn_fallback(app);
            }
            return Err(e);
        }

        session.start_reset_poll(app);
        Ok(())
    }

    async fn post_reset_intent(&self, app: TrackedApp) -> crate::Result<()> {
        let url = self.endpoints.cycle_reset(app);
        self.http
            .post_json(url.as_str(), &serde_json::json!({}))
            .await?
            .error_for_status(url.as_str())?;
        Ok(())
    }
}

impl std::fmt::Debug for CountdownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownEngine")
            .field("apps", &self.config.apps)
            .field("active", &self.is_active())
            .field("timers", &self.timer_count())
            .finish()
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::countdown::timer::{UrgencyBand, REFRESHING_TEXT, UNAVAILABLE_TEXT, WAITING_TEXT};
    use crate::io::{HttpResponse, MockHttpClient};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        "2030-01-01T00:00:00Z".parse().unwrap()
    }

    fn config(apps: &[TrackedApp]) -> CountdownConfig {
        CountdownConfig {
            apps: apps.to_vec(),
            ..CountdownConfig::default()
        }
    }

    fn engine(mock: MockHttpClient, apps: &[TrackedApp]) -> CountdownEngine {
        CountdownEngine::new(
            Arc::new(mock),
            Endpoints::new("http://huntarr/").unwrap(),
            Arc::new(TokioClock::anchored_at(t0())),
            config(apps),
        )
    }

    fn sleep_json(body: &'static str, calls: Arc<AtomicUsize>) -> MockHttpClient {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url, _| url.contains("sleep.json"))
            .returning(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    Ok(HttpResponse {
                        status: 200,
                        body: body.to_string(),
                    })
                })
            });
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn cells_count_down_after_first_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mock = sleep_json(
            r#"{"sonarr": {"next_cycle": "2030-01-01T00:10:00Z"}}"#,
            Arc::clone(&calls),
        );
        let engine = engine(mock, &[TrackedApp::Sonarr, TrackedApp::Radarr]);

        engine.initialize();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sonarr = engine.cell(TrackedApp::Sonarr).await.unwrap();
        assert_eq!(sonarr.display, "00:10:00");
        assert_eq!(sonarr.band, UrgencyBand::Normal);
        let radarr = engine.cell(TrackedApp::Radarr).await.unwrap();
        assert_eq!(radarr.display, WAITING_TEXT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let sonarr = engine.cell(TrackedApp::Sonarr).await.unwrap();
        assert_eq!(sonarr.display, "00:09:00");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_keeps_cells_waiting() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_, _| {
            Box::pin(async { Err(PanelError::Network("connection refused".to_string())) })
        });
        let engine = engine(mock, &[TrackedApp::Sonarr]);

        engine.initialize();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cell = engine.cell(TrackedApp::Sonarr).await.unwrap();
        assert_eq!(cell.display, WAITING_TEXT);
        assert_eq!(cell.band, UrgencyBand::Refreshing);
        assert!(!engine.is_fetching());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cell_shows_placeholder_then_falls_back() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mock = sleep_json(
            r#"{"sonarr": {"next_cycle": "2030-01-01T00:00:30Z"}}"#,
            Arc::clone(&calls),
        );
        let engine = engine(mock, &[TrackedApp::Sonarr]);

        engine.initialize();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            engine.cell(TrackedApp::Sonarr).await.unwrap().display,
            "00:00:30"
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        let cell = engine.cell(TrackedApp::Sonarr).await.unwrap();
        assert_eq!(cell.display, REFRESHING_TEXT);
        assert_eq!(cell.band, UrgencyBand::Refreshing);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let cell = engine.cell(TrackedApp::Sonarr).await.unwrap();
        assert_eq!(cell.display, UNAVAILABLE_TEXT);
        assert_eq!(cell.band, UrgencyBand::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_stops_every_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mock = sleep_json(
            r#"{"sonarr": {"next_cycle": "2030-01-01T01:00:00Z"}}"#,
            Arc::clone(&calls),
        );
        let engine = engine(mock, &TrackedApp::ALL);

        engine.initialize();
        assert_eq!(engine.timer_count(), TrackedApp::ALL.len());
        tokio::time::sleep(Duration::from_millis(10)).await;

        engine.cleanup();
        assert!(!engine.is_active());
        assert_eq!(engine.timer_count(), 0);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for cell in engine.cells().await {
            assert_eq!(cell.display, WAITING_TEXT);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_intent_failure_restores_countdown() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{"radarr": {"next_cycle": "2030-01-01T00:10:00Z"}}"#.to_string(),
                })
            })
        });
        mock.expect_post_json()
            .withf(|url, _| url.ends_with("/api/cycle/reset/radarr"))
            .returning(|_, _| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 500,
                        body: String::new(),
                    })
                })
            });
        let engine = engine(mock, &[TrackedApp::Radarr]);

        engine.initialize();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = engine.reset(TrackedApp::Radarr).await.unwrap_err();
        assert!(matches!(err, PanelError::HttpStatus { status: 500, .. }));
        let cell = engine.cell(TrackedApp::Radarr).await.unwrap();
        assert!(!cell.waiting_for_reset);
        assert_eq!(cell.display, "00:09:59");
    }

    #[tokio::test]
    async fn reset_rejects_untracked_app() {
        let engine = engine(MockHttpClient::new(), &[TrackedApp::Sonarr]);
        let err = engine.reset(TrackedApp::Eros).await.unwrap_err();
        assert!(matches!(err, PanelError::InvalidArgument(_)));
    }
}
