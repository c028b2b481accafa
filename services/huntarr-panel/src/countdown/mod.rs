//! Per-app cycle countdown
//!
//! `board` is the pure state machine, `source` reads the shared cycle state
//! and `engine` wires both to timers, the refresh loop and the reset protocol.

pub mod board;
pub mod engine;
pub mod source;
pub mod timer;

pub use board::{CountdownBoard, SnapshotOutcome, TickOutcome};
pub use engine::CountdownEngine;
pub use source::CycleSource;
pub use timer::{format_hms, RefreshPhase, TimerCell, UrgencyBand};
