//! Scripted backend shared by the integration and BDD tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use huntarr_panel::io::{HttpClient, HttpResponse};
use huntarr_panel::PanelError;

#[derive(Debug, Clone)]
pub enum Reply {
    Respond { status: u16, body: String },
    Fail(String),
}

/// A recorded HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone)]
struct Route {
    method: String,
    fragment: String,
    reply: Reply,
    delay: Duration,
}

/// An HTTP client answering from a route table keyed on method and URL fragment.
///
/// Unmatched requests get a 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct FakeBackend {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Mutex<Duration>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` requests whose URL contains `fragment`, replacing any earlier reply
    pub fn route(&self, method: &str, fragment: &str, reply: Reply) {
        self.route_after(method, fragment, Duration::ZERO, reply);
    }

    /// Like `route`, but the reply is held for `delay` on top of the global delay
    pub fn route_after(&self, method: &str, fragment: &str, delay: Duration, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|r| !(r.method == method && r.fragment == fragment));
        routes.push(Route {
            method: method.to_string(),
            fragment: fragment.to_string(),
            reply,
            delay,
        });
    }

    pub fn respond(&self, method: &str, fragment: &str, status: u16, body: &str) {
        self.route(
            method,
            fragment,
            Reply::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn fail(&self, method: &str, fragment: &str, message: &str) {
        self.route(method, fragment, Reply::Fail(message.to_string()));
    }

    /// Serve `body` as the cycle state document
    pub fn sleep_document(&self, body: &str) {
        self.respond("GET", "static/data/sleep.json", 200, body);
    }

    /// Hold every response for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    async fn answer(&self, method: &str, url: &str) -> huntarr_panel::Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
        });
        let route = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.method == method && url.contains(r.fragment.as_str()))
            .cloned();
        let delay =
            *self.delay.lock().unwrap() + route.as_ref().map_or(Duration::ZERO, |r| r.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match route.map(|r| r.reply) {
            Some(Reply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(Reply::Fail(message)) => Err(PanelError::Network(message)),
            None => Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeBackend {
    async fn get(&self, url: &str, _no_cache: bool) -> huntarr_panel::Result<HttpResponse> {
        self.answer("GET", url).await
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
    ) -> huntarr_panel::Result<HttpResponse> {
        self.answer("POST", url).await
    }

    async fn delete(&self, url: &str) -> huntarr_panel::Result<HttpResponse> {
        self.answer("DELETE", url).await
    }
}
