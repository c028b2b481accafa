//! Web panel with JSON API endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::watch;

use crate::activation::Section;
use crate::apps::TrackedApp;
use crate::countdown::{CountdownEngine, TimerCell};
use crate::history::{HistoryBrowser, HistoryQuery};
use crate::html::escape_html;
use crate::log_stream::SocketStatus;
use crate::log_view::{with_log_view, LogViewHandle};
use crate::notify::{Notification, NotificationLog, Notifier};
use crate::PanelError;

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub engine: Arc<CountdownEngine>,
    pub history: Arc<HistoryBrowser>,
    pub logs: LogViewHandle,
    pub socket_status: Arc<watch::Sender<SocketStatus>>,
    pub sections: Arc<watch::Sender<Section>>,
    pub notifications: Arc<NotificationLog>,
}

/// Build the dashboard axum router
pub fn build_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/timers", get(timers_handler))
        .route("/api/timers/{app}/reset", post(reset_handler))
        .route("/api/section/{section}", post(section_handler))
        .route(
            "/api/history",
            get(history_handler).delete(history_clear_handler),
        )
        .route("/api/history/query", post(history_query_handler))
        .route("/api/logs", get(logs_handler))
        .route("/api/logs/clear", post(logs_clear_handler))
        .route("/api/notifications", get(notifications_handler))
        .with_state(state)
}

fn error_response(err: &PanelError) -> Response {
    let status = match err {
        PanelError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

fn timer_json(cell: &TimerCell) -> serde_json::Value {
    serde_json::json!({
        "app": cell.app,
        "name": cell.app.display_name(),
        "display": cell.display,
        "band": cell.band,
        "css_class": cell.band.css_class(),
        "next_cycle_at": cell.next_cycle_at,
        "waiting_for_reset": cell.waiting_for_reset,
    })
}

fn timer_card(cell: &TimerCell) -> String {
    format!(
        r#"<div class="timer-card" id="timer-{app}">
            <div class="timer-name">{name}</div>
            <div class="timer-value {class}">{display}</div>
            <button class="reset-button" data-app="{app}">Reset</button>
        </div>"#,
        app = cell.app,
        name = cell.app.display_name(),
        class = cell.band.css_class(),
        display = escape_html(&cell.display),
    )
}

fn app_option(app: &TrackedApp) -> String {
    format!(r#"<option value="{}">{}</option>"#, app, app.display_name())
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let timer_cards: String = dashboard.engine.cells().await.iter().map(timer_card).collect();
    let app_options: String = TrackedApp::ALL.iter().map(app_option).collect();
    let history_rows: String = dashboard.history.render_rows().concat();
    let log_rows: String = with_log_view(&dashboard.logs, |view| view.render_html().concat());
    let section = *dashboard.sections.borrow();
    let status = *dashboard.socket_status.borrow();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Huntarr Panel</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 1rem; }}
        nav button {{ padding: 0.4rem 0.9rem; margin-right: 0.25rem; }}
        nav button.active {{ font-weight: 700; }}
        section[hidden] {{ display: none; }}
        .timers {{ display: flex; flex-wrap: wrap; gap: 0.75rem; }}
        .timer-card {{ border: 1px solid #dee2e6; border-radius: 0.4rem; padding: 0.75rem; min-width: 9rem; }}
        .timer-value {{ font-family: monospace; font-size: 1.4rem; }}
        .timer-normal {{ color: #155724; }}
        .timer-soon {{ color: #856404; }}
        .timer-imminent {{ color: #721c24; font-weight: 700; }}
        .timer-refreshing {{ color: #6c757d; font-style: italic; }}
        .timer-unavailable {{ color: #6c757d; }}
        table {{ width: 100%; border-collapse: collapse; }}
        td, th {{ padding: 0.5rem; text-align: left; border-bottom: 1px solid #dee2e6; }}
        .info-icon {{ position: relative; cursor: help; }}
        .history-tooltip {{ display: none; position: fixed; z-index: 10; background: #212529; color: #f8f9fa; padding: 0.5rem; border-radius: 0.25rem; max-width: 28rem; }}
        .info-icon:hover .history-tooltip, .info-icon:focus .history-tooltip {{ display: block; }}
        .operation-status {{ display: inline-block; padding: 0.2em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; }}
        .operation-status.missing {{ background: #cce5ff; }}
        .operation-status.upgrade {{ background: #d4edda; }}
        .operation-status.warning {{ background: #fff3cd; }}
        .operation-status.error {{ background: #f8d7da; }}
        .operation-status.success {{ background: #d4edda; }}
        #log-rows {{ font-family: monospace; max-height: 30rem; overflow-y: auto; }}
        .log-warning {{ color: #856404; }}
        .log-error, .log-critical {{ color: #721c24; }}
        .log-debug {{ color: #6c757d; }}
    </style>
    <script>
        function selectSection(name) {{
            fetch('/api/section/' + name, {{ method: 'POST' }});
            document.querySelectorAll('section[data-section]').forEach(s => {{
                s.hidden = s.dataset.section !== name;
            }});
            document.querySelectorAll('nav button').forEach(b => {{
                b.classList.toggle('active', b.dataset.section === name);
            }});
            if (name === 'history') {{ setTimeout(refreshHistory, 500); }}
        }}
        function refreshTimers() {{
            fetch('/api/timers')
                .then(r => r.json())
                .then(cells => {{
                    cells.forEach(c => {{
                        const card = document.getElementById('timer-' + c.app);
                        if (!card) return;
                        const value = card.querySelector('.timer-value');
                        value.textContent = c.display;
                        value.className = 'timer-value ' + c.css_class;
                    }});
                }});
        }}
        function resetApp(app) {{
            fetch('/api/timers/' + app + '/reset', {{ method: 'POST' }})
                .then(() => {{ refreshTimers(); refreshNotifications(); }});
        }}
        function renderHistory(data) {{
            document.getElementById('history-body').innerHTML = data.rows.join('');
            document.getElementById('history-page').textContent =
                'Page ' + data.view.current_page + ' of ' + data.view.total_pages;
        }}
        function refreshHistory() {{
            fetch('/api/history').then(r => r.json()).then(renderHistory);
        }}
        function queryHistory(query) {{
            fetch('/api/history/query', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify(query),
            }}).then(() => {{ refreshHistory(); refreshNotifications(); }});
        }}
        function clearHistory() {{
            if (!confirm('Clear history for the selected app?')) return;
            fetch('/api/history', {{ method: 'DELETE' }})
                .then(() => {{ refreshHistory(); refreshNotifications(); }});
        }}
        function refreshLogs() {{
            fetch('/api/logs')
                .then(r => r.json())
                .then(data => {{
                    const container = document.getElementById('log-rows');
                    container.innerHTML = data.rows.join('');
                    document.getElementById('log-status').textContent = data.status;
                    if (data.scroll_target !== null) {{
                        const row = document.getElementById('log-' + data.scroll_target);
                        if (row) row.scrollIntoView({{ block: 'end' }});
                    }}
                }});
        }}
        function clearLogs() {{
            fetch('/api/logs/clear', {{ method: 'POST' }}).then(refreshLogs);
        }}
        function refreshNotifications() {{
            fetch('/api/notifications')
                .then(r => r.json())
                .then(items => {{
                    document.getElementById('notifications').innerHTML = items.reverse().map(n => {{
                        const li = document.createElement('li');
                        li.className = 'notification-' + n.level;
                        li.textContent = new Date(n.timestamp_epoch_ms).toLocaleTimeString() + ' ' + n.message;
                        return li.outerHTML;
                    }}).join('');
                }});
        }}
        // keep a hovered tooltip inside the viewport
        document.addEventListener('mouseover', e => {{
            const icon = e.target.closest && e.target.closest('.info-icon');
            if (!icon) return;
            const tip = icon.querySelector('.history-tooltip');
            const anchor = icon.getBoundingClientRect();
            const box = tip.getBoundingClientRect();
            let left = anchor.right + 8;
            let top = anchor.top;
            if (left + box.width > window.innerWidth) left = Math.max(0, anchor.left - box.width - 8);
            if (top + box.height > window.innerHeight) top = Math.max(0, window.innerHeight - box.height - 8);
            tip.style.left = left + 'px';
            tip.style.top = top + 'px';
        }});
        document.addEventListener('click', e => {{
            const reset = e.target.closest && e.target.closest('.reset-button');
            if (reset) resetApp(reset.dataset.app);
        }});
        setInterval(refreshTimers, 1000);
        setInterval(refreshLogs, 2000);
        setInterval(refreshNotifications, 5000);
        window.addEventListener('load', () => selectSection('{section}'));
    </script>
</head>
<body>
    <h1>Huntarr Panel</h1>
    <nav>
        <button data-section="home" onclick="selectSection('home')">Home</button>
        <button data-section="history" onclick="selectSection('history')">History</button>
        <button data-section="logs" onclick="selectSection('logs')">Logs</button>
        <button data-section="settings" onclick="selectSection('settings')">Settings</button>
    </nav>
    <section data-section="home">
        <h2>Next Cycle</h2>
        <div class="timers">{timer_cards}</div>
    </section>
    <section data-section="history" hidden>
        <h2>History</h2>
        <div>
            <select onchange="queryHistory({{ app: this.value }})">
                <option value="all">All</option>
                {app_options}
            </select>
            <input type="search" placeholder="Search" onchange="queryHistory({{ search: this.value }})">
            <select onchange="queryHistory({{ page_size: Number(this.value) }})">
                <option>10</option><option selected>20</option><option>30</option><option>50</option><option>100</option>
            </select>
            <button onclick="clearHistory()">Clear</button>
        </div>
        <table>
            <thead>
                <tr><th>Processed</th><th>Instance</th><th>Operation</th><th>App</th><th>When</th></tr>
            </thead>
            <tbody id="history-body">{history_rows}</tbody>
        </table>
        <div>
            <button onclick="queryHistory({{ page: 'prev' }})">Previous</button>
            <span id="history-page"></span>
            <button onclick="queryHistory({{ page: 'next' }})">Next</button>
        </div>
    </section>
    <section data-section="logs" hidden>
        <h2>Logs <small id="log-status">{status}</small></h2>
        <button onclick="clearLogs()">Clear</button>
        <div id="log-rows">{log_rows}</div>
    </section>
    <section data-section="settings" hidden>
        <h2>Settings</h2>
        <p>Settings are managed by the backend.</p>
    </section>
    <aside>
        <h2>Notifications</h2>
        <ul id="notifications"></ul>
    </aside>
</body>
</html>"#,
        section = section,
        timer_cards = timer_cards,
        app_options = app_options,
        history_rows = history_rows,
        status = status,
        log_rows = log_rows,
    );

    Html(html)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

async fn timers_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let cells: Vec<serde_json::Value> = dashboard.engine.cells().await.iter().map(timer_json).collect();
    Json(cells)
}

async fn reset_handler(
    State(dashboard): State<DashboardState>,
    Path(app): Path<String>,
) -> Response {
    let app: TrackedApp = match app.parse() {
        Ok(app) => app,
        Err(e) => return error_response(&e),
    };
    match dashboard.engine.reset(app).await {
        Ok(()) => {
            dashboard.notifications.notify(Notification::success(format!(
                "{} cycle reset requested",
                app.display_name()
            )));
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "app": app, "status": "reset requested" })),
            )
                .into_response()
        }
        Err(e) => {
            dashboard.notifications.notify(Notification::error(format!(
                "Failed to reset {} cycle: {}",
                app.display_name(),
                e
            )));
            error_response(&e)
        }
    }
}

async fn section_handler(
    State(dashboard): State<DashboardState>,
    Path(section): Path<String>,
) -> Response {
    match section.parse::<Section>() {
        Ok(section) => {
            dashboard.sections.send_replace(section);
            Json(serde_json::json!({ "section": section })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

fn history_json(history: &HistoryBrowser) -> serde_json::Value {
    serde_json::json!({
        "view": history.view(),
        "rows": history.render_rows(),
    })
}

async fn history_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(history_json(&dashboard.history))
}

async fn history_query_handler(
    State(dashboard): State<DashboardState>,
    Json(query): Json<HistoryQuery>,
) -> Response {
    match dashboard.history.query(query).await {
        Ok(()) => Json(history_json(&dashboard.history)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn history_clear_handler(State(dashboard): State<DashboardState>) -> Response {
    match dashboard.history.clear().await {
        Ok(()) => Json(history_json(&dashboard.history)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn logs_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let status = *dashboard.socket_status.borrow();
    let (rows, scroll_target) = with_log_view(&dashboard.logs, |view| {
        (view.render_html(), view.scroll_target())
    });
    Json(serde_json::json!({
        "status": status,
        "rows": rows,
        "scroll_target": scroll_target,
    }))
}

async fn logs_clear_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    with_log_view(&dashboard.logs, |view| view.clear());
    StatusCode::NO_CONTENT
}

async fn notifications_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(dashboard.notifications.recent())
}
