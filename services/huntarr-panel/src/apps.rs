//! The downstream media applications Huntarr drives

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PanelError;

/// A media application whose cycles the panel tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackedApp {
    #[serde(rename = "sonarr")]
    Sonarr,
    #[serde(rename = "radarr")]
    Radarr,
    #[serde(rename = "lidarr")]
    Lidarr,
    #[serde(rename = "readarr")]
    Readarr,
    #[serde(rename = "whisparr")]
    Whisparr,
    #[serde(rename = "whisparr-v3")]
    WhisparrV3,
    #[serde(rename = "eros")]
    Eros,
}

impl TrackedApp {
    pub const ALL: [TrackedApp; 7] = [
        TrackedApp::Sonarr,
        TrackedApp::Radarr,
        TrackedApp::Lidarr,
        TrackedApp::Readarr,
        TrackedApp::Whisparr,
        TrackedApp::WhisparrV3,
        TrackedApp::Eros,
    ];

    /// Wire name, as used in URLs and JSON keys
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedApp::Sonarr => "sonarr",
            TrackedApp::Radarr => "radarr",
            TrackedApp::Lidarr => "lidarr",
            TrackedApp::Readarr => "readarr",
            TrackedApp::Whisparr => "whisparr",
            TrackedApp::WhisparrV3 => "whisparr-v3",
            TrackedApp::Eros => "eros",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TrackedApp::Sonarr => "Sonarr",
            TrackedApp::Radarr => "Radarr",
            TrackedApp::Lidarr => "Lidarr",
            TrackedApp::Readarr => "Readarr",
            TrackedApp::Whisparr => "Whisparr",
            TrackedApp::WhisparrV3 => "Whisparr V3",
            TrackedApp::Eros => "Eros",
        }
    }

    /// Path pattern of the app's detail page, with `{id}` standing for the item id.
    ///
    /// `whisparr-v3` shares the Eros web UI and therefore its pattern.
    pub fn deep_link_pattern(&self) -> &'static str {
        match self {
            TrackedApp::Sonarr => "/series/{id}",
            TrackedApp::Radarr | TrackedApp::Whisparr | TrackedApp::Eros => "/movie/{id}",
            TrackedApp::WhisparrV3 => TrackedApp::Eros.deep_link_pattern(),
            TrackedApp::Lidarr => "/artist/{id}",
            TrackedApp::Readarr => "/author/{id}",
        }
    }
}

impl fmt::Display for TrackedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedApp {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackedApp::ALL
            .into_iter()
            .find(|app| app.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PanelError::InvalidArgument(format!("unknown app '{}'", s)))
    }
}
