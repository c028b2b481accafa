//! Starts and stops panel components as the selected section changes

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::countdown::CountdownEngine;
use crate::history::HistoryBrowser;
use crate::PanelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Home,
    History,
    Logs,
    Settings,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Home => "home",
            Section::History => "history",
            Section::Logs => "logs",
            Section::Settings => "settings",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "home" => Ok(Section::Home),
            "history" => Ok(Section::History),
            "logs" => Ok(Section::Logs),
            "settings" => Ok(Section::Settings),
            _ => Err(PanelError::InvalidArgument(format!("unknown section '{}'", s))),
        }
    }
}

/// Apply one section change to the countdown engine and history browser
pub async fn apply_transition(
    previous: Option<Section>,
    current: Section,
    engine: &CountdownEngine,
    history: &Arc<HistoryBrowser>,
) {
    let was_home = previous == Some(Section::Home);
    let is_home = current == Section::Home;

    if is_home && !was_home {
        tracing::debug!("Home view visible; starting countdown");
        engine.initialize();
    } else if was_home && !is_home {
        tracing::debug!("Home view hidden; stopping countdown");
        engine.cleanup();
    }

    if current == Section::History && previous != Some(Section::History) {
        // the section loop never waits on the fetch; failures surface as notifications
        let history = Arc::clone(history);
        tokio::spawn(async move {
            let _ = history.load().await;
        });
    }
}

/// Watch the selected section until cancelled, applying the initial one first
pub fn spawn_activation(
    mut sections: watch::Receiver<Section>,
    engine: Arc<CountdownEngine>,
    history: Arc<HistoryBrowser>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous = None;
        loop {
            let current = *sections.borrow_and_update();
            if previous != Some(current) {
                tracing::info!("Section: {}", current);
                apply_transition(previous, current, &engine, &history).await;
                previous = Some(current);
            }

            tokio::select! {
                changed = sections.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Section channel closed");
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        engine.cleanup();
    })
}
