//! Fetching the shared cycle state

use std::sync::Arc;

use crate::apps::TrackedApp;
use crate::clock::Clock;
use crate::cycle::{CycleRecord, CycleSnapshot};
use crate::endpoints::Endpoints;
use crate::io::HttpClient;

/// Reads the cycle state document, falling back to the status API
#[derive(Clone)]
pub struct CycleSource {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    clock: Arc<dyn Clock>,
    apps: Vec<TrackedApp>,
}

impl std::fmt::Debug for CycleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleSource")
            .field("base", &self.endpoints.base().as_str())
            .field("apps", &self.apps)
            .finish()
    }
}

impl CycleSource {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        clock: Arc<dyn Clock>,
        apps: Vec<TrackedApp>,
    ) -> Self {
        Self {
            http,
            endpoints,
            clock,
            apps,
        }
    }

    /// Fetch the full snapshot: the static sleep document first, then the status API
    pub async fn fetch(&self) -> crate::Result<CycleSnapshot> {
        let sleep_url = self.endpoints.sleep_state(self.clock.now_epoch_ms());
        match self.fetch_document(sleep_url.as_str(), true).await {
            Ok(snapshot) => Ok(snapshot),
            Err(primary) => {
                tracing::debug!("Cycle document unavailable ({}); trying status API", primary);
                let status_url = self.endpoints.cycle_status(None);
                self.fetch_document(status_url.as_str(), false)
                    .await
                    .map_err(|fallback| {
                        tracing::debug!("Cycle status API unavailable: {}", fallback);
                        primary
                    })
            }
        }
    }

    /// Fetch one app's record from the status API
    pub async fn fetch_app(&self, app: TrackedApp) -> crate::Result<CycleRecord> {
        let url = self.endpoints.cycle_status(Some(app));
        let response = self
            .http
            .get(url.as_str(), true)
            .await?
            .error_for_status(url.as_str())?;
        CycleSnapshot::parse_single(&response.body, app)
    }

    async fn fetch_document(&self, url: &str, no_cache: bool) -> crate::Result<CycleSnapshot> {
        let response = self
            .http
            .get(url, no_cache)
            .await?
            .error_for_status(url)?;
        CycleSnapshot::parse(&response.body, &self.apps)
    }
}
