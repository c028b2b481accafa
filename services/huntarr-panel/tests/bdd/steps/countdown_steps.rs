//! BDD step definitions for the countdown feature

use chrono::{DateTime, Duration, Utc};
use cucumber::{given, then, when};

use huntarr_panel::countdown::{CountdownBoard, TickOutcome, UrgencyBand};
use huntarr_panel::cycle::CycleSnapshot;
use huntarr_panel::TrackedApp;

use crate::world::PanelWorld;

pub fn parse_app(s: &str) -> TrackedApp {
    s.parse()
        .unwrap_or_else(|_| panic!("Unknown app: {}", s))
}

fn parse_band(s: &str) -> UrgencyBand {
    match s {
        "normal" => UrgencyBand::Normal,
        "soon" => UrgencyBand::Soon,
        "imminent" => UrgencyBand::Imminent,
        "refreshing" => UrgencyBand::Refreshing,
        "unavailable" => UrgencyBand::Unavailable,
        other => panic!("Unknown band: {}", other),
    }
}

pub fn now(world: &PanelWorld) -> DateTime<Utc> {
    world.now.expect("clock not set")
}

pub fn board(world: &mut PanelWorld) -> &mut CountdownBoard {
    world.board.as_mut().expect("board not set")
}

/// Apply a cycle document naming one app's next cycle
pub fn apply_next_cycle(world: &mut PanelWorld, app: TrackedApp, next_cycle: DateTime<Utc>) {
    let now = now(world);
    let board = board(world);
    let apps: Vec<TrackedApp> = board.apps().collect();
    let body = format!(
        r#"{{"{}": {{"next_cycle": "{}"}}}}"#,
        app,
        next_cycle.to_rfc3339()
    );
    let snapshot = CycleSnapshot::parse(&body, &apps).expect("cycle document should parse");
    let outcome = board.apply_snapshot(&snapshot, now);
    world.last_outcome = Some(outcome);
}

#[given(expr = "a countdown board tracking {string}")]
fn board_tracking(world: &mut PanelWorld, apps: String) {
    let apps: Vec<TrackedApp> = apps.split(',').map(|s| parse_app(s.trim())).collect();
    world.board = Some(CountdownBoard::new(&apps));
}

#[given(expr = "the clock reads {string}")]
fn clock_reads(world: &mut PanelWorld, instant: String) {
    world.now = Some(instant.parse().expect("invalid instant"));
}

#[given(expr = "the cycle state says {string} runs next in {int} seconds")]
fn state_runs_in(world: &mut PanelWorld, app: String, seconds: i64) {
    let next_cycle = now(world) + Duration::seconds(seconds);
    apply_next_cycle(world, parse_app(&app), next_cycle);
}

#[when(expr = "the cycle state changes so {string} runs next in {int} seconds")]
fn state_changes(world: &mut PanelWorld, app: String, seconds: i64) {
    state_runs_in(world, app, seconds);
}

#[when(expr = "{int} seconds pass")]
fn seconds_pass(world: &mut PanelWorld, seconds: i64) {
    let later = now(world) + Duration::seconds(seconds);
    world.now = Some(later);
    let board = board(world);
    let apps: Vec<TrackedApp> = board.apps().collect();
    let mut last = None;
    for app in apps {
        last = Some(board.tick(app, later));
    }
    world.last_tick = last;
}

#[when("a state fetch fails")]
fn fetch_fails(world: &mut PanelWorld) {
    board(world).fetch_failed();
}

#[when(expr = "the refreshing fallback fires for {string}")]
fn fallback_fires(world: &mut PanelWorld, app: String) {
    board(world).refreshing_fallback(parse_app(&app));
}

#[then(expr = "{string} shows {string}")]
fn app_shows(world: &mut PanelWorld, app: String, expected: String) {
    let cell = board(world)
        .cell(parse_app(&app))
        .expect("app not on the board");
    assert_eq!(cell.display, expected);
}

#[then(expr = "{string} is in the {string} band")]
fn app_in_band(world: &mut PanelWorld, app: String, band: String) {
    let cell = board(world)
        .cell(parse_app(&app))
        .expect("app not on the board");
    assert_eq!(cell.band, parse_band(&band));
}

#[then("the tick reports expiry")]
fn tick_reports_expiry(world: &mut PanelWorld) {
    assert_eq!(world.last_tick, Some(TickOutcome::Expired));
}

#[then(expr = "{string} is refreshing")]
fn app_is_refreshing(world: &mut PanelWorld, app: String) {
    assert!(board(world).is_refreshing(parse_app(&app)));
}
