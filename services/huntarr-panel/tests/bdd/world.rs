//! BDD test world for the huntarr panel

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cucumber::World;
use huntarr_panel::countdown::{CountdownBoard, SnapshotOutcome, TickOutcome};
use huntarr_panel::notify::NotificationLog;
use huntarr_panel::{CountdownEngine, HistoryBrowser, Section};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::FakeBackend;

#[derive(Debug, Default, World)]
pub struct PanelWorld {
    // Countdown board testing
    pub board: Option<CountdownBoard>,
    pub now: Option<DateTime<Utc>>,
    pub last_tick: Option<TickOutcome>,
    pub last_outcome: Option<SnapshotOutcome>,

    // Backend shared by history and activation scenarios
    pub backend: Option<Arc<FakeBackend>>,
    pub notifications: Option<Arc<NotificationLog>>,

    // History testing
    pub history: Option<Arc<HistoryBrowser>>,
    pub rows: Vec<String>,
    pub last_error: Option<String>,

    // Activation testing
    pub engine: Option<Arc<CountdownEngine>>,
    pub sections: Option<watch::Sender<Section>>,
    pub activation: Option<JoinHandle<()>>,
    pub cancel: Option<CancellationToken>,
}
