//! Backend URL construction
//!
//! Every backend resource is addressed relative to a single base URL, the
//! way the browser panel resolves `./api/...` against its own origin.

use url::Url;

use crate::apps::TrackedApp;

/// Which history bucket to address: one app or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryScope {
    #[default]
    All,
    App(TrackedApp),
}

impl HistoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryScope::All => "all",
            HistoryScope::App(app) => app.as_str(),
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(HistoryScope::All)
        } else {
            s.parse().map(HistoryScope::App)
        }
    }
}

impl serde::Serialize for HistoryScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Builds backend URLs from the configured base
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| {
            crate::PanelError::Config(format!("Invalid backend base_url '{}': {}", base_url, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn join(&self, relative: &str) -> Url {
        // `relative` never starts with a scheme, so joining onto a valid base cannot fail
        self.base
            .join(relative)
            .unwrap_or_else(|_| self.base.clone())
    }

    pub fn history(&self, scope: HistoryScope, page: u32, page_size: u32, search: &str) -> Url {
        let mut url = self.join(&format!("api/history/{}", scope.as_str()));
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string())
            .append_pair("search", search);
        url
    }

    pub fn history_clear(&self, scope: HistoryScope) -> Url {
        self.join(&format!("api/history/{}", scope.as_str()))
    }

    pub fn instances(&self) -> Url {
        self.join("api/instances/all")
    }

    pub fn cycle_status(&self, app: Option<TrackedApp>) -> Url {
        match app {
            Some(app) => self.join(&format!("api/cycle/status/{}", app)),
            None => self.join("api/cycle/status"),
        }
    }

    pub fn cycle_reset(&self, app: TrackedApp) -> Url {
        self.join(&format!("api/cycle/reset/{}", app))
    }

    /// The statically served cycle document, with a cache-busting timestamp
    pub fn sleep_state(&self, now_epoch_ms: i64) -> Url {
        let mut url = self.join("static/data/sleep.json");
        url.query_pairs_mut()
            .append_pair("t", &now_epoch_ms.to_string());
        url
    }

    /// WebSocket URL of the log stream on the backend host
    pub fn log_socket(&self) -> Url {
        let mut url = self.join("/ws/logs");
        let scheme = if self.base.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        // http(s) -> ws(s) is a permitted scheme change for special schemes
        let _ = url.set_scheme(scheme);
        url
    }
}
