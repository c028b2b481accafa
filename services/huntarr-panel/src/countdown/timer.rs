//! Per-app timer cells and urgency bands

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::apps::TrackedApp;

/// Shown before the first successful refresh
pub const WAITING_TEXT: &str = "Waiting for Cycle";
/// Shown while a cell's value is being re-read
pub const REFRESHING_TEXT: &str = "Refreshing";
/// Shown when a refresh or reset gave up
pub const UNAVAILABLE_TEXT: &str = "--:--:--";

/// Visual classification of a timer; exactly one applies to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBand {
    Normal,
    Soon,
    Imminent,
    Refreshing,
    Unavailable,
}

impl UrgencyBand {
    /// Band for a positive remaining time
    pub fn for_remaining(remaining_secs: i64) -> Self {
        if remaining_secs < 60 {
            UrgencyBand::Imminent
        } else if remaining_secs < 300 {
            UrgencyBand::Soon
        } else {
            UrgencyBand::Normal
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            UrgencyBand::Normal => "timer-normal",
            UrgencyBand::Soon => "timer-soon",
            UrgencyBand::Imminent => "timer-imminent",
            UrgencyBand::Refreshing => "timer-refreshing",
            UrgencyBand::Unavailable => "timer-unavailable",
        }
    }
}

/// Where an expired cell is in its refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    /// Counting down, or waiting for its first value
    Idle,
    /// Expired; a re-read is pending
    Refreshing,
    /// The refreshing fallback fired; stays put until a new value arrives
    GaveUp,
}

/// Display state of one app's countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerCell {
    pub app: TrackedApp,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub waiting_for_reset: bool,
    pub original_cycle_at: Option<DateTime<Utc>>,
    pub display: String,
    pub band: UrgencyBand,
    pub phase: RefreshPhase,
}

impl TimerCell {
    pub fn waiting(app: TrackedApp) -> Self {
        Self {
            app,
            next_cycle_at: None,
            waiting_for_reset: false,
            original_cycle_at: None,
            display: WAITING_TEXT.to_string(),
            band: UrgencyBand::Refreshing,
            phase: RefreshPhase::Idle,
        }
    }

    pub(crate) fn show(&mut self, text: &str, band: UrgencyBand) {
        self.display = text.to_string();
        self.band = band;
    }

    pub(crate) fn show_remaining(&mut self, remaining_secs: i64) {
        self.display = format_hms(remaining_secs);
        self.band = UrgencyBand::for_remaining(remaining_secs);
    }

    /// True while the display is one of the placeholders
    pub fn is_placeholder(&self) -> bool {
        self.band == UrgencyBand::Refreshing
    }
}

/// Format seconds as `HH:MM:SS`; hours are not wrapped at 24
pub fn format_hms(total_secs: i64) -> String {
    let total = total_secs.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
