//! BDD step definitions for the section activation feature

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cucumber::{given, then, when};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use huntarr_panel::activation::spawn_activation;
use huntarr_panel::clock::SystemClock;
use huntarr_panel::config::CountdownConfig;
use huntarr_panel::endpoints::Endpoints;
use huntarr_panel::notify::NotificationLog;
use huntarr_panel::{CountdownEngine, HistoryBrowser, Section, TrackedApp};

use crate::common::FakeBackend;
use crate::world::PanelWorld;

/// Let spawned tasks react to a section change
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn engine(world: &PanelWorld) -> &Arc<CountdownEngine> {
    world.engine.as_ref().expect("engine not set")
}

#[given("a panel tracking every app, opened on the home section")]
async fn panel_on_home(world: &mut PanelWorld) {
    let backend = Arc::new(FakeBackend::new());
    let next_cycle = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    backend.sleep_document(&format!(
        r#"{{"sonarr": {{"next_cycle": "{}"}}}}"#,
        next_cycle
    ));
    backend.respond(
        "GET",
        "api/history/",
        200,
        r#"{"entries": [], "total_pages": 1}"#,
    );

    let endpoints = Endpoints::new("http://huntarr.local:9705/").expect("valid base url");
    let notifications = Arc::new(NotificationLog::new(50));
    let engine = Arc::new(CountdownEngine::new(
        backend.clone(),
        endpoints.clone(),
        Arc::new(SystemClock),
        CountdownConfig {
            apps: TrackedApp::ALL.to_vec(),
            ..CountdownConfig::default()
        },
    ));
    let history = Arc::new(HistoryBrowser::new(
        backend.clone(),
        endpoints,
        notifications.clone(),
        20,
    ));

    let (sections, receiver) = watch::channel(Section::Home);
    let cancel = CancellationToken::new();
    let activation = spawn_activation(
        receiver,
        Arc::clone(&engine),
        Arc::clone(&history),
        cancel.clone(),
    );
    settle().await;

    world.backend = Some(backend);
    world.notifications = Some(notifications);
    world.engine = Some(engine);
    world.history = Some(history);
    world.sections = Some(sections);
    world.activation = Some(activation);
    world.cancel = Some(cancel);
}

#[when(expr = "the operator switches to the {string} section")]
async fn switch_section(world: &mut PanelWorld, section: String) {
    let section: Section = section.parse().expect("valid section");
    world
        .sections
        .as_ref()
        .expect("sections not set")
        .send_replace(section);
    settle().await;
}

#[when("the panel shuts down")]
async fn panel_shuts_down(world: &mut PanelWorld) {
    world.cancel.as_ref().expect("cancel not set").cancel();
    let activation = world.activation.take().expect("activation not started");
    activation.await.expect("activation task panicked");
}

#[then(expr = "{int} countdown timer(s) running")]
fn timers_running(world: &mut PanelWorld, count: usize) {
    assert_eq!(engine(world).timer_count(), count);
}

#[then("the countdown is stopped")]
fn countdown_stopped(world: &mut PanelWorld) {
    let engine = engine(world);
    assert!(!engine.is_active());
    assert_eq!(engine.timer_count(), 0);
}

#[then(expr = "{string} counts down")]
async fn app_counts_down(world: &mut PanelWorld, app: String) {
    let app: TrackedApp = app.parse().expect("valid app");
    let cell = engine(world).cell(app).await.expect("app not tracked");
    assert!(
        cell.display.starts_with("00:59") || cell.display == "01:00:00",
        "unexpected display {}",
        cell.display
    );
}

#[then(expr = "the history was fetched {int} time(s)")]
fn history_fetched(world: &mut PanelWorld, count: usize) {
    let backend = world.backend.as_ref().expect("backend not set");
    assert_eq!(backend.count("GET", "api/history/"), count);
}
