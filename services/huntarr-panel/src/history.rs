//! Paginated, searchable history of per-instance operations
//!
//! `HistoryBrowser` owns the view state (scope, page, page size, search) and
//! the last successfully loaded table. Loads are token-ordered: a response
//! that arrives after a newer request was issued is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::OnceCell;

use crate::apps::TrackedApp;
use crate::config::ALLOWED_PAGE_SIZES;
use crate::endpoints::{Endpoints, HistoryScope};
use crate::html::{escape_html, operation_badge};
use crate::io::HttpClient;
use crate::notify::{Notification, Notifier};
use crate::PanelError;

pub const EMPTY_STATE_TEXT: &str = "No history entries found";

/// One processed item as returned by the history API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub processed_info: String,
    #[serde(default)]
    pub operation_type: String,
    #[serde(default)]
    pub date_time_readable: String,
    #[serde(default)]
    pub how_long_ago: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

impl HistoryPage {
    pub fn parse(body: &str) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        serde_json::from_value(value).map_err(|e| PanelError::Schema(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `app_type -> instance_name -> instance settings`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstancesConfig(pub BTreeMap<String, BTreeMap<String, InstanceInfo>>);

impl InstancesConfig {
    pub fn parse(body: &str) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        serde_json::from_value(value).map_err(|e| PanelError::Schema(e.to_string()))
    }

    pub fn api_url(&self, app_type: &str, instance_name: &str) -> Option<&str> {
        self.0
            .get(app_type)?
            .get(instance_name)?
            .api_url
            .as_deref()
            .filter(|url| !url.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Link to the item's page in the originating app, when both parts are known
pub fn deep_link(entry: &HistoryEntry, instances: &InstancesConfig) -> Option<String> {
    let app: TrackedApp = entry.app_type.parse().ok()?;
    let api_url = instances.api_url(&entry.app_type, &entry.instance_name)?;
    Some(format!(
        "{}{}",
        api_url,
        app.deep_link_pattern().replace("{id}", &entry.id)
    ))
}

/// Pretty-printed projection shown in the row's info tooltip
pub fn tooltip_json(entry: &HistoryEntry) -> String {
    let projection = serde_json::json!({
        "title": entry.processed_info,
        "id": entry.id,
        "app": entry.app_type,
        "instance": entry.instance_name,
        "date": entry.date_time_readable,
        "operation": entry.operation_type,
        "details": entry.details,
    });
    serde_json::to_string_pretty(&projection).unwrap_or_default()
}

/// Render one table row; the tooltip lives inside the row
pub fn render_row(entry: &HistoryEntry, instances: &InstancesConfig) -> String {
    let title = escape_html(&entry.processed_info);
    let title = match deep_link(entry, instances) {
        Some(url) => format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            escape_html(&url),
            title
        ),
        None => title,
    };
    let app_label = entry
        .app_type
        .parse::<TrackedApp>()
        .map(|app| app.display_name().to_string())
        .unwrap_or_else(|_| entry.app_type.clone());

    format!(
        concat!(
            r#"<tr class="history-row" data-id="{id}">"#,
            r#"<td class="history-title"><span class="info-icon" tabindex="0"><i class="fas fa-info-circle"></i>"#,
            r#"<div class="history-tooltip" role="tooltip"><pre>{tooltip}</pre></div></span> {title}</td>"#,
            r#"<td class="history-instance">{instance}</td>"#,
            r#"<td class="history-operation">{operation}</td>"#,
            r#"<td class="history-app">{app}</td>"#,
            r#"<td class="history-when" title="{date}">{ago}</td>"#,
            "</tr>"
        ),
        id = escape_html(&entry.id),
        tooltip = escape_html(&tooltip_json(entry)),
        title = title,
        instance = escape_html(&entry.instance_name),
        operation = operation_badge(&entry.operation_type),
        app = escape_html(&app_label),
        date = escape_html(&entry.date_time_readable),
        ago = escape_html(&entry.how_long_ago),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    Prev,
    Next,
}

/// A batch of view changes applied with a single load
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page: Option<PageDirection>,
}

/// Current query and paging state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryView {
    pub current_app: HistoryScope,
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub search_query: String,
    pub is_loading: bool,
}

impl HistoryView {
    fn new(page_size: u32) -> Self {
        Self {
            current_app: HistoryScope::All,
            current_page: 1,
            total_pages: 1,
            page_size,
            search_query: String::new(),
            is_loading: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryTable {
    NotLoaded,
    Empty,
    Rows(Vec<HistoryEntry>),
}

#[derive(Debug)]
struct BrowserState {
    view: HistoryView,
    table: HistoryTable,
}

pub struct HistoryBrowser {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    notifier: Arc<dyn Notifier>,
    instances: OnceCell<InstancesConfig>,
    state: Mutex<BrowserState>,
    latest_token: AtomicU64,
}

impl HistoryBrowser {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        notifier: Arc<dyn Notifier>,
        page_size: u32,
    ) -> Self {
        Self {
            http,
            endpoints,
            notifier,
            instances: OnceCell::new(),
            state: Mutex::new(BrowserState {
                view: HistoryView::new(page_size),
                table: HistoryTable::NotLoaded,
            }),
            latest_token: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn view(&self) -> HistoryView {
        self.state().view.clone()
    }

    pub fn table(&self) -> HistoryTable {
        self.state().table.clone()
    }

    /// Instances config, loading it once on first use; failures degrade to empty
    pub async fn instances(&self) -> &InstancesConfig {
        self.instances
            .get_or_init(|| async {
                match self.fetch_instances().await {
                    Ok(config) => {
                        tracing::debug!("Loaded instances config for {} apps", config.0.len());
                        config
                    }
                    Err(e) => {
                        tracing::warn!("Instances config unavailable, deep-links disabled: {}", e);
                        InstancesConfig::default()
                    }
                }
            })
            .await
    }

    async fn fetch_instances(&self) -> crate::Result<InstancesConfig> {
        let url = self.endpoints.instances();
        let response = self
            .http
            .get(url.as_str(), false)
            .await?
            .error_for_status(url.as_str())?;
        InstancesConfig::parse(&response.body)
    }

    /// Fetch the page described by the current view and replace the table
    pub async fn load(&self) -> crate::Result<()> {
        self.instances().await;

        let token = self.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
        let url = {
            let mut state = self.state();
            state.view.is_loading = true;
            let view = &state.view;
            self.endpoints.history(
                view.current_app,
                view.current_page,
                view.page_size,
                &view.search_query,
            )
        };
        tracing::debug!("Loading history (request {}): {}", token, url);

        let result = self.fetch_page(url.as_str()).await;

        let mut state = self.state();
        if token != self.latest_token.load(Ordering::SeqCst) {
            tracing::debug!("Discarding stale history response (request {})", token);
            return Ok(());
        }
        state.view.is_loading = false;

        match result {
            Ok(page) => {
                state.view.total_pages = page.total_pages.max(1);
                state.view.current_page = state.view.current_page.min(state.view.total_pages);
                state.table = if page.entries.is_empty() {
                    HistoryTable::Empty
                } else {
                    HistoryTable::Rows(page.entries)
                };
                Ok(())
            }
            Err(e) => {
                drop(state);
                tracing::warn!("History load failed: {}", e);
                self.notifier
                    .notify(Notification::error(format!("Error loading history: {}", e)));
                Err(e)
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> crate::Result<HistoryPage> {
        let response = self.http.get(url, false).await?.error_for_status(url)?;
        HistoryPage::parse(&response.body)
    }

    pub async fn set_app(&self, scope: HistoryScope) -> crate::Result<()> {
        {
            let mut state = self.state();
            if state.view.current_app != scope {
                state.view.current_app = scope;
                state.view.current_page = 1;
            }
        }
        self.load().await
    }

    pub async fn set_search(&self, query: &str) -> crate::Result<()> {
        let query = query.trim();
        {
            let mut state = self.state();
            if state.view.search_query != query {
                state.view.search_query = query.to_string();
                state.view.current_page = 1;
            }
        }
        self.load().await
    }

    pub async fn set_page_size(&self, page_size: u32) -> crate::Result<()> {
        if !ALLOWED_PAGE_SIZES.contains(&page_size) {
            return Err(PanelError::InvalidArgument(format!(
                "page size {} not in {:?}",
                page_size, ALLOWED_PAGE_SIZES
            )));
        }
        {
            let mut state = self.state();
            if state.view.page_size != page_size {
                state.view.page_size = page_size;
                state.view.current_page = 1;
            }
        }
        self.load().await
    }

    /// Move one page, staying within `1..=total_pages`
    ///
    /// A failed load puts the previous page back, so the indicator keeps
    /// matching the rows still on screen.
    pub async fn paginate(&self, direction: PageDirection) -> crate::Result<()> {
        let (previous, target) = {
            let mut state = self.state();
            let view = &mut state.view;
            let previous = view.current_page;
            let target = match direction {
                PageDirection::Prev => previous.saturating_sub(1).max(1),
                PageDirection::Next => (previous + 1).min(view.total_pages),
            };
            view.current_page = target;
            (previous, target)
        };
        if target == previous {
            tracing::debug!("Already at the {:?} boundary", direction);
            return Ok(());
        }
        if let Err(e) = self.load().await {
            let mut state = self.state();
            if state.view.current_page == target {
                state.view.current_page = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Apply every field of `query`, then load once.
    ///
    /// Scope, search and page size reset to page 1 when they change; the page
    /// direction is applied last against the current page count.
    pub async fn query(&self, query: HistoryQuery) -> crate::Result<()> {
        let scope = query.app.as_deref().map(HistoryScope::parse).transpose()?;
        if let Some(page_size) = query.page_size {
            if !ALLOWED_PAGE_SIZES.contains(&page_size) {
                return Err(PanelError::InvalidArgument(format!(
                    "page size {} not in {:?}",
                    page_size, ALLOWED_PAGE_SIZES
                )));
            }
        }
        {
            let mut state = self.state();
            let view = &mut state.view;
            if let Some(scope) = scope {
                if view.current_app != scope {
                    view.current_app = scope;
                    view.current_page = 1;
                }
            }
            if let Some(search) = query.search.as_deref().map(str::trim) {
                if view.search_query != search {
                    view.search_query = search.to_string();
                    view.current_page = 1;
                }
            }
            if let Some(page_size) = query.page_size {
                if view.page_size != page_size {
                    view.page_size = page_size;
                    view.current_page = 1;
                }
            }
            match query.page {
                Some(PageDirection::Prev) => {
                    view.current_page = view.current_page.saturating_sub(1).max(1)
                }
                Some(PageDirection::Next) => {
                    view.current_page = (view.current_page + 1).min(view.total_pages)
                }
                None => {}
            }
        }
        self.load().await
    }

    /// Delete the history of the current scope, then reload
    pub async fn clear(&self) -> crate::Result<()> {
        let scope = self.state().view.current_app;
        let url = self.endpoints.history_clear(scope);
        let result = match self.http.delete(url.as_str()).await {
            Ok(response) => response.error_for_status(url.as_str()).map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!("Clearing {} history failed: {}", scope.as_str(), e);
            self.notifier
                .notify(Notification::error(format!("Error clearing history: {}", e)));
            return Err(e);
        }
        tracing::info!("Cleared {} history", scope.as_str());
        self.notifier.notify(Notification::success(format!(
            "{} history cleared",
            scope.as_str()
        )));
        self.state().view.current_page = 1;
        self.load().await
    }

    /// Table body as HTML: the rows, the empty state, or nothing before the first load
    pub fn render_rows(&self) -> Vec<String> {
        let empty = InstancesConfig::default();
        let instances = self.instances.get().unwrap_or(&empty);
        match &self.state().table {
            HistoryTable::NotLoaded => Vec::new(),
            HistoryTable::Empty => vec![format!(
                r#"<tr class="history-empty"><td colspan="5">{}</td></tr>"#,
                EMPTY_STATE_TEXT
            )],
            HistoryTable::Rows(entries) => entries
                .iter()
                .map(|entry| render_row(entry, instances))
                .collect(),
        }
    }
}

impl std::fmt::Debug for HistoryBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBrowser")
            .field("view", &self.view())
            .field("instances_loaded", &self.instances.initialized())
            .finish()
    }
}
