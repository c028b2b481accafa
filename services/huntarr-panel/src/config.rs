//! Configuration types for the Huntarr panel

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::apps::TrackedApp;

/// Page sizes the history browser accepts
pub const ALLOWED_PAGE_SIZES: [u32; 5] = [10, 20, 30, 50, 100];

/// Smallest log buffer the panel will run with
pub const MIN_LOG_BUFFER: usize = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Where the Huntarr backend lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Cadences of the cycle countdown engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_apps")]
    pub apps: Vec<TrackedApp>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_fetch_retry")]
    pub fetch_retry_ms: u64,
    #[serde(default = "default_refreshing_fallback")]
    pub refreshing_fallback_seconds: u64,
    #[serde(default = "default_reset_poll_interval")]
    pub reset_poll_interval_seconds: u64,
    #[serde(default = "default_reset_poll_max_attempts")]
    pub reset_poll_max_attempts: u32,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            apps: default_apps(),
            refresh_interval_seconds: default_refresh_interval(),
            tick_interval_ms: default_tick_interval(),
            fetch_retry_ms: default_fetch_retry(),
            refreshing_fallback_seconds: default_refreshing_fallback(),
            reset_poll_interval_seconds: default_reset_poll_interval(),
            reset_poll_max_attempts: default_reset_poll_max_attempts(),
        }
    }
}

impl CountdownConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn fetch_retry(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_ms)
    }

    pub fn refreshing_fallback(&self) -> Duration {
        Duration::from_secs(self.refreshing_fallback_seconds)
    }

    pub fn reset_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reset_poll_interval_seconds)
    }
}

/// History browser defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Log tail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_reconnect")]
    pub reconnect_seconds: u64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            reconnect_seconds: default_reconnect(),
            buffer_size: default_buffer_size(),
            auto_scroll: true,
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_notification_history_size")]
    pub notification_history_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            notification_history_size: default_notification_history_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:9705/".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_apps() -> Vec<TrackedApp> {
    TrackedApp::ALL.to_vec()
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_fetch_retry() -> u64 {
    1000
}

fn default_refreshing_fallback() -> u64 {
    5
}

fn default_reset_poll_interval() -> u64 {
    5
}

fn default_reset_poll_max_attempts() -> u32 {
    60
}

fn default_page_size() -> u32 {
    20
}

fn default_reconnect() -> u64 {
    5
}

fn default_buffer_size() -> usize {
    MIN_LOG_BUFFER
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    9706
}

fn default_notification_history_size() -> usize {
    50
}

impl Config {
    /// Reject configurations the panel cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let base = url::Url::parse(&self.backend.base_url).map_err(|e| {
            crate::PanelError::Config(format!(
                "Invalid backend base_url '{}': {}",
                self.backend.base_url, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(crate::PanelError::Config(format!(
                "backend base_url must be http or https, got '{}'",
                base.scheme()
            )));
        }
        if self.backend.request_timeout_seconds == 0 {
            return Err(crate::PanelError::Config(
                "request_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.countdown.apps.is_empty() {
            return Err(crate::PanelError::Config(
                "countdown.apps must list at least one app".to_string(),
            ));
        }
        let countdown = &self.countdown;
        if countdown.refresh_interval_seconds == 0
            || countdown.tick_interval_ms == 0
            || countdown.fetch_retry_ms == 0
            || countdown.reset_poll_interval_seconds == 0
            || countdown.reset_poll_max_attempts == 0
        {
            return Err(crate::PanelError::Config(
                "countdown intervals and attempt limits must be greater than zero".to_string(),
            ));
        }
        if !ALLOWED_PAGE_SIZES.contains(&self.history.page_size) {
            return Err(crate::PanelError::Config(format!(
                "history.page_size must be one of {:?}, got {}",
                ALLOWED_PAGE_SIZES, self.history.page_size
            )));
        }
        if self.logs.buffer_size < MIN_LOG_BUFFER {
            return Err(crate::PanelError::Config(format!(
                "logs.buffer_size must be at least {}, got {}",
                MIN_LOG_BUFFER, self.logs.buffer_size
            )));
        }
        if self.logs.reconnect_seconds == 0 {
            return Err(crate::PanelError::Config(
                "logs.reconnect_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::PanelError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        crate::PanelError::Config(format!("Failed to parse config file {:?}: {}", path, e))
    })?;
    Ok(config)
}
