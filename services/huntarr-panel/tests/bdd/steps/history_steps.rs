//! BDD step definitions for the history feature

use std::sync::Arc;

use cucumber::{given, then, when};

use huntarr_panel::endpoints::{Endpoints, HistoryScope};
use huntarr_panel::history::HistoryBrowser;
use huntarr_panel::notify::{NotificationLevel, NotificationLog};

use crate::common::FakeBackend;
use crate::world::PanelWorld;

fn backend(world: &PanelWorld) -> &Arc<FakeBackend> {
    world.backend.as_ref().expect("backend not set")
}

#[given("a history backend")]
fn history_backend(world: &mut PanelWorld) {
    let backend = Arc::new(FakeBackend::new());
    let notifications = Arc::new(NotificationLog::new(50));
    let browser = HistoryBrowser::new(
        backend.clone(),
        Endpoints::new("http://huntarr.local:9705/").expect("valid base url"),
        notifications.clone(),
        20,
    );
    world.backend = Some(backend);
    world.notifications = Some(notifications);
    world.history = Some(Arc::new(browser));
}

#[given("the instances config is unavailable")]
fn instances_unavailable(world: &mut PanelWorld) {
    backend(world).respond("GET", "api/instances/all", 500, "");
}

#[given(expr = "the {string} instance {string} is served from {string}")]
fn instance_served_from(world: &mut PanelWorld, app: String, instance: String, url: String) {
    let body = format!(
        r#"{{"{}": {{"{}": {{"api_url": "{}", "enabled": true}}}}}}"#,
        app, instance, url
    );
    backend(world).respond("GET", "api/instances/all", 200, &body);
}

#[given(expr = "the {string} history holds item {string} titled {string} with operation {string}")]
fn history_holds(
    world: &mut PanelWorld,
    app: String,
    id: String,
    title: String,
    operation: String,
) {
    let body = serde_json::json!({
        "entries": [{
            "id": id,
            "app_type": app,
            "instance_name": "main",
            "processed_info": title,
            "operation_type": operation,
            "date_time_readable": "2030-01-01 10:00",
            "how_long_ago": "just now",
        }],
        "total_pages": 1,
    });
    backend(world).respond(
        "GET",
        &format!("api/history/{}", app),
        200,
        &body.to_string(),
    );
}

#[given(expr = "the {string} history cannot be reached")]
fn history_unreachable(world: &mut PanelWorld, app: String) {
    backend(world).fail(
        "GET",
        &format!("api/history/{}", app),
        "connection refused",
    );
}

#[when(expr = "the {string} history is opened")]
async fn history_opened(world: &mut PanelWorld, app: String) {
    let scope = HistoryScope::parse(&app).expect("valid history scope");
    let history = world.history.as_ref().expect("history not set");
    world.last_error = history.set_app(scope).await.err().map(|e| e.to_string());
    world.rows = history.render_rows();
}

#[then(expr = "{int} history row(s) shown")]
fn rows_shown(world: &mut PanelWorld, count: usize) {
    assert_eq!(world.rows.len(), count);
}

#[then(expr = "the row contains {string}")]
fn row_contains(world: &mut PanelWorld, expected: String) {
    let row = world.rows.first().expect("no rows rendered");
    assert!(
        row.contains(&expected),
        "Expected row to contain '{}', but it didn't.\nRow:\n{}",
        expected,
        row
    );
}

#[then(expr = "the row does not contain {string}")]
fn row_does_not_contain(world: &mut PanelWorld, unexpected: String) {
    let row = world.rows.first().expect("no rows rendered");
    assert!(
        !row.contains(&unexpected),
        "Expected row not to contain '{}'.\nRow:\n{}",
        unexpected,
        row
    );
}

#[then(expr = "an error notification mentions {string}")]
fn error_notification(world: &mut PanelWorld, text: String) {
    let notifications = world.notifications.as_ref().expect("notifications not set");
    let found = notifications
        .recent()
        .iter()
        .any(|n| n.level == NotificationLevel::Error && n.message.contains(&text));
    assert!(found, "no error notification mentioning '{}'", text);
    assert!(world.last_error.is_some());
}
