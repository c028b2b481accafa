//! The countdown state machine
//!
//! `CountdownBoard` owns every timer cell and decides what each one shows.
//! It never sleeps or fetches; the engine feeds it ticks, snapshots and
//! timeouts and acts on what it returns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::timer::{
    RefreshPhase, TimerCell, UrgencyBand, REFRESHING_TEXT, UNAVAILABLE_TEXT, WAITING_TEXT,
};
use crate::apps::TrackedApp;
use crate::cycle::CycleSnapshot;

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to render or the placeholder must stay
    Unchanged,
    /// The remaining time was rendered
    Counting { remaining_secs: i64 },
    /// The cell just expired and entered the refreshing substate
    Expired,
}

/// What applying a snapshot changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Apps whose reset wait ended because `next_cycle` changed
    pub completed_resets: Vec<TrackedApp>,
    /// Apps that received a value already in the past
    pub expired: Vec<TrackedApp>,
}

#[derive(Debug, Clone)]
pub struct CountdownBoard {
    cells: BTreeMap<TrackedApp, TimerCell>,
    has_snapshot: bool,
}

impl CountdownBoard {
    /// Every cell starts in the "Waiting for Cycle" state
    pub fn new(apps: &[TrackedApp]) -> Self {
        Self {
            cells: apps
                .iter()
                .map(|app| (*app, TimerCell::waiting(*app)))
                .collect(),
            has_snapshot: false,
        }
    }

    pub fn apps(&self) -> impl Iterator<Item = TrackedApp> + '_ {
        self.cells.keys().copied()
    }

    pub fn cell(&self, app: TrackedApp) -> Option<&TimerCell> {
        self.cells.get(&app)
    }

    pub fn cells(&self) -> Vec<TimerCell> {
        self.cells.values().cloned().collect()
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn is_refreshing(&self, app: TrackedApp) -> bool {
        self.cells
            .get(&app)
            .is_some_and(|cell| !cell.waiting_for_reset && cell.phase == RefreshPhase::Refreshing)
    }

    pub fn is_waiting_for_reset(&self, app: TrackedApp) -> bool {
        self.cells
            .get(&app)
            .is_some_and(|cell| cell.waiting_for_reset)
    }

    /// Render one app's countdown at `now`
    pub fn tick(&mut self, app: TrackedApp, now: DateTime<Utc>) -> TickOutcome {
        let Some(cell) = self.cells.get_mut(&app) else {
            return TickOutcome::Unchanged;
        };
        if cell.waiting_for_reset {
            return TickOutcome::Unchanged;
        }
        let Some(next_cycle_at) = cell.next_cycle_at else {
            return TickOutcome::Unchanged;
        };

        let remaining_ms = (next_cycle_at - now).num_milliseconds();
        if remaining_ms > 0 {
            let remaining_secs = remaining_ms / 1000;
            cell.phase = RefreshPhase::Idle;
            cell.show_remaining(remaining_secs);
            return TickOutcome::Counting { remaining_secs };
        }

        match cell.phase {
            RefreshPhase::Idle => {
                cell.phase = RefreshPhase::Refreshing;
                cell.show(REFRESHING_TEXT, UrgencyBand::Refreshing);
                TickOutcome::Expired
            }
            RefreshPhase::Refreshing | RefreshPhase::GaveUp => TickOutcome::Unchanged,
        }
    }

    /// Store a freshly fetched snapshot and re-render affected cells
    pub fn apply_snapshot(&mut self, snapshot: &CycleSnapshot, now: DateTime<Utc>) -> SnapshotOutcome {
        self.has_snapshot = true;
        let mut outcome = SnapshotOutcome::default();

        for (app, record) in snapshot.iter() {
            let Some(cell) = self.cells.get_mut(&app) else {
                continue;
            };
            let next_cycle = record.next_cycle;
            let changed = cell.next_cycle_at != Some(next_cycle);
            cell.next_cycle_at = Some(next_cycle);

            if cell.waiting_for_reset {
                if cell.original_cycle_at == Some(next_cycle) {
                    continue;
                }
                cell.waiting_for_reset = false;
                cell.original_cycle_at = None;
                cell.phase = RefreshPhase::Idle;
                outcome.completed_resets.push(app);
            } else if changed {
                cell.phase = RefreshPhase::Idle;
            }

            if self.tick(app, now) == TickOutcome::Expired {
                outcome.expired.push(app);
            }
        }

        outcome
    }

    /// A fetch failed; without any snapshot every idle cell goes back to waiting
    pub fn fetch_failed(&mut self) {
        if self.has_snapshot {
            return;
        }
        for cell in self.cells.values_mut() {
            if !cell.waiting_for_reset {
                cell.phase = RefreshPhase::Idle;
                cell.show(WAITING_TEXT, UrgencyBand::Refreshing);
            }
        }
    }

    /// Enter the reset wait, capturing the schedule that must change.
    ///
    /// Returns the captured original, or `None` if the app is not on the board.
    pub fn begin_reset(&mut self, app: TrackedApp) -> Option<Option<DateTime<Utc>>> {
        let cell = self.cells.get_mut(&app)?;
        cell.original_cycle_at = cell.next_cycle_at;
        cell.waiting_for_reset = true;
        cell.phase = RefreshPhase::Idle;
        cell.show(REFRESHING_TEXT, UrgencyBand::Refreshing);
        Some(cell.original_cycle_at)
    }

    /// Leave the reset wait without a new schedule (the intent was not accepted).
    ///
    /// Returns `Expired` when the kept schedule is already in the past; the
    /// caller must then start a refresh and the fallback like any expiry.
    pub fn abandon_reset(&mut self, app: TrackedApp, now: DateTime<Utc>) -> TickOutcome {
        let Some(cell) = self.cells.get_mut(&app) else {
            return TickOutcome::Unchanged;
        };
        cell.waiting_for_reset = false;
        cell.original_cycle_at = None;
        if cell.next_cycle_at.is_none() {
            cell.show(WAITING_TEXT, UrgencyBand::Refreshing);
        }
        self.tick(app, now)
    }

    /// The reset poll budget ran out
    pub fn reset_timed_out(&mut self, app: TrackedApp) {
        let Some(cell) = self.cells.get_mut(&app) else {
            return;
        };
        cell.waiting_for_reset = false;
        cell.original_cycle_at = None;
        cell.phase = RefreshPhase::GaveUp;
        cell.show(UNAVAILABLE_TEXT, UrgencyBand::Unavailable);
    }

    /// The refreshing fallback fired; returns true if the cell was still refreshing
    pub fn refreshing_fallback(&mut self, app: TrackedApp) -> bool {
        let Some(cell) = self.cells.get_mut(&app) else {
            return false;
        };
        if cell.waiting_for_reset || cell.phase != RefreshPhase::Refreshing {
            return false;
        }
        cell.phase = RefreshPhase::GaveUp;
        cell.show(UNAVAILABLE_TEXT, UrgencyBand::Unavailable);
        true
    }
}
