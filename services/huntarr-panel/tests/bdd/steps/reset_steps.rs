//! BDD step definitions for the reset feature

use chrono::Duration;
use cucumber::{then, when};

use super::countdown_steps::{apply_next_cycle, board, now, parse_app};
use crate::world::PanelWorld;

#[when(expr = "a reset is requested for {string}")]
fn reset_requested(world: &mut PanelWorld, app: String) {
    let captured = board(world).begin_reset(parse_app(&app));
    assert!(captured.is_some(), "{} is not on the board", app);
}

#[when(expr = "the reset intent for {string} is rejected")]
fn reset_rejected(world: &mut PanelWorld, app: String) {
    let now = now(world);
    board(world).abandon_reset(parse_app(&app), now);
}

#[when(expr = "the reset poll budget for {string} runs out")]
fn reset_budget_exhausted(world: &mut PanelWorld, app: String) {
    board(world).reset_timed_out(parse_app(&app));
}

#[when(expr = "a poll reports {string} running next in {int} seconds")]
fn poll_reports(world: &mut PanelWorld, app: String, seconds: i64) {
    let next_cycle = now(world) + Duration::seconds(seconds);
    apply_next_cycle(world, parse_app(&app), next_cycle);
}

#[then(expr = "{string} is waiting for a reset")]
fn waiting_for_reset(world: &mut PanelWorld, app: String) {
    assert!(board(world).is_waiting_for_reset(parse_app(&app)));
}

#[then(expr = "{string} is not waiting for a reset")]
fn not_waiting_for_reset(world: &mut PanelWorld, app: String) {
    assert!(!board(world).is_waiting_for_reset(parse_app(&app)));
}

#[then(expr = "the reset of {string} completed")]
fn reset_completed(world: &mut PanelWorld, app: String) {
    let outcome = world.last_outcome.as_ref().expect("no snapshot applied");
    assert!(outcome.completed_resets.contains(&parse_app(&app)));
}

#[then("no reset completed")]
fn no_reset_completed(world: &mut PanelWorld) {
    let outcome = world.last_outcome.as_ref().expect("no snapshot applied");
    assert!(outcome.completed_resets.is_empty());
}
