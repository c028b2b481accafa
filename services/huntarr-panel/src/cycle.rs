//! Cycle state document parsing
//!
//! The backend publishes one record per app:
//! `{"sonarr": {"next_cycle": "...", "remaining_seconds": 42, "updated_at": "..."}}`.
//! Parsing is per app: a malformed record is logged and skipped without
//! affecting the others.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::apps::TrackedApp;
use crate::PanelError;

/// The schedule of one app's next cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleRecord {
    pub next_cycle: DateTime<Utc>,
    pub remaining_seconds: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The latest parsed cycle state for every app that had a usable record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSnapshot {
    records: BTreeMap<TrackedApp, CycleRecord>,
}

impl CycleSnapshot {
    /// Parse a full cycle document, keeping only `apps`.
    ///
    /// Fails with `Parse` for malformed JSON, `Schema` when the document is not
    /// an object, and `StaleOrEmptyState` when no tracked app has a usable record.
    pub fn parse(body: &str, apps: &[TrackedApp]) -> crate::Result<Self> {
        let document: Value = serde_json::from_str(body)?;
        let object = document.as_object().ok_or_else(|| {
            PanelError::Schema("cycle state document is not a JSON object".to_string())
        })?;

        let mut records = BTreeMap::new();
        for app in apps {
            let Some(value) = object.get(app.as_str()) else {
                continue;
            };
            match parse_record(value) {
                Ok(record) => {
                    records.insert(*app, record);
                }
                Err(e) => {
                    tracing::warn!("Skipping cycle state for {}: {}", app, e);
                }
            }
        }

        if records.is_empty() {
            return Err(PanelError::StaleOrEmptyState(
                "no tracked app has a usable next_cycle".to_string(),
            ));
        }
        Ok(Self { records })
    }

    /// Parse a per-app status response, either bare or wrapped under the app key
    pub fn parse_single(body: &str, app: TrackedApp) -> crate::Result<CycleRecord> {
        let document: Value = serde_json::from_str(body)?;
        let value = document.get(app.as_str()).unwrap_or(&document);
        parse_record(value)
    }

    pub fn get(&self, app: TrackedApp) -> Option<&CycleRecord> {
        self.records.get(&app)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackedApp, &CycleRecord)> {
        self.records.iter().map(|(app, record)| (*app, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(TrackedApp, CycleRecord)> for CycleSnapshot {
    fn from_iter<I: IntoIterator<Item = (TrackedApp, CycleRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

fn parse_record(value: &Value) -> crate::Result<CycleRecord> {
    let object = value
        .as_object()
        .ok_or_else(|| PanelError::Schema("cycle record is not a JSON object".to_string()))?;

    let next_cycle = object
        .get("next_cycle")
        .ok_or_else(|| PanelError::Schema("missing next_cycle".to_string()))?
        .as_str()
        .ok_or_else(|| PanelError::Schema("next_cycle is not a string".to_string()))
        .and_then(parse_instant)?;

    let remaining_seconds = match object.get("remaining_seconds") {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let seconds = raw.as_i64().or_else(|| raw.as_f64().map(|f| f as i64));
            match seconds {
                Some(s) if s >= 0 => Some(s as u64),
                _ => {
                    tracing::debug!("Ignoring invalid remaining_seconds {}", raw);
                    None
                }
            }
        }
    };

    let updated_at = object
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| parse_instant(s).ok());

    Ok(CycleRecord {
        next_cycle,
        remaining_seconds,
        updated_at,
    })
}

/// Parse an absolute instant: RFC 3339, or a naive ISO timestamp taken as UTC
pub fn parse_instant(raw: &str) -> crate::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| PanelError::Parse(format!("invalid timestamp '{}': {}", raw, e)))
}
