//! Notifier trait for surfacing user-facing messages

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message shown to the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp_epoch_ms: u64,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp_epoch_ms: current_epoch_ms(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }
}

/// Trait for surfacing notifications to the operator
pub trait Notifier: Send + Sync + std::fmt::Debug {
    fn notify(&self, notification: Notification);
}

/// The panel's notification channel: keeps the most recent notifications for
/// display and mirrors them to the log
#[derive(Debug)]
pub struct NotificationLog {
    entries: Mutex<VecDeque<Notification>>,
    max_size: usize,
}

impl NotificationLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size: max_size.max(1),
        }
    }

    /// Most recent notifications, oldest first
    pub fn recent(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error | NotificationLevel::Warning => {
                tracing::warn!("Notification: {}", notification.message)
            }
            _ => tracing::info!("Notification: {}", notification.message),
        }
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() >= self.max_size {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

/// Fallback when no notification channel is displayed: an alert in the log
#[derive(Debug, Default)]
pub struct AlertNotifier;

impl Notifier for AlertNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!("ALERT: {}", notification.message),
            NotificationLevel::Warning => tracing::warn!("ALERT: {}", notification.message),
            _ => tracing::info!("{}", notification.message),
        }
    }
}

fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
