//! Huntarr Panel - headless control panel for the Huntarr media-automation supervisor
//!
//! Tails the backend log stream, browses the operation history and keeps a
//! live countdown to each app's next scheduled cycle, with a small web
//! dashboard on top.

pub mod activation;
pub mod apps;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod cycle;
pub mod dashboard;
pub mod endpoints;
pub mod error;
pub mod history;
pub mod html;
pub mod io;
pub mod log_stream;
pub mod log_view;
pub mod notify;

pub use activation::Section;
pub use apps::TrackedApp;
pub use config::{load_config, Config};
pub use countdown::CountdownEngine;
pub use error::{PanelError, Result};
pub use history::HistoryBrowser;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::dashboard::DashboardState;
use crate::endpoints::Endpoints;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::log_stream::{open_log_socket, SocketStatus};
use crate::log_view::{new_log_view_handle, with_log_view, LogViewHandle};
use crate::notify::{AlertNotifier, NotificationLog, Notifier};

/// Builder for the panel; collaborators can be swapped for tests
pub struct PanelBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    cancel: Option<CancellationToken>,
}

impl PanelBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            clock: None,
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<Panel> {
        self.config.validate()?;
        let endpoints = Endpoints::new(&self.config.backend.base_url)?;
        let http = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new(self.config.backend.request_timeout())?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let notifications = self
            .config
            .dashboard
            .enabled
            .then(|| Arc::new(NotificationLog::new(self.config.dashboard.notification_history_size)));
        let notifier: Arc<dyn Notifier> = match &notifications {
            Some(log) => Arc::clone(log) as Arc<dyn Notifier>,
            None => Arc::new(AlertNotifier),
        };

        let engine = CountdownEngine::new(
            Arc::clone(&http),
            endpoints.clone(),
            clock,
            self.config.countdown.clone(),
        );
        let history = HistoryBrowser::new(
            http,
            endpoints.clone(),
            notifier,
            self.config.history.page_size,
        );
        let (socket_status, _) = watch::channel(SocketStatus::Connecting);
        let (sections, _) = watch::channel(Section::Home);

        Ok(Panel {
            logs: new_log_view_handle(self.config.logs.buffer_size, self.config.logs.auto_scroll),
            config: self.config,
            endpoints,
            engine: Arc::new(engine),
            history: Arc::new(history),
            socket_status: Arc::new(socket_status),
            sections: Arc::new(sections),
            notifications,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// A fully wired panel, ready to start
pub struct Panel {
    config: Config,
    endpoints: Endpoints,
    engine: Arc<CountdownEngine>,
    history: Arc<HistoryBrowser>,
    logs: LogViewHandle,
    socket_status: Arc<watch::Sender<SocketStatus>>,
    sections: Arc<watch::Sender<Section>>,
    notifications: Option<Arc<NotificationLog>>,
    cancel: CancellationToken,
}

impl Panel {
    pub fn engine(&self) -> &Arc<CountdownEngine> {
        &self.engine
    }

    pub fn history(&self) -> &Arc<HistoryBrowser> {
        &self.history
    }

    pub fn logs(&self) -> &LogViewHandle {
        &self.logs
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sender that drives section activation once the panel is started
    pub fn sections(&self) -> Arc<watch::Sender<Section>> {
        Arc::clone(&self.sections)
    }

    /// Router state, when the dashboard is enabled
    pub fn dashboard_state(&self) -> Option<DashboardState> {
        let notifications = self.notifications.as_ref()?;
        Some(DashboardState {
            engine: Arc::clone(&self.engine),
            history: Arc::clone(&self.history),
            logs: Arc::clone(&self.logs),
            socket_status: Arc::clone(&self.socket_status),
            sections: Arc::clone(&self.sections),
            notifications: Arc::clone(notifications),
        })
    }

    /// Run until the cancellation token fires (ctrl-c in production)
    pub async fn start(self) -> Result<()> {
        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::error!("Failed to listen for ctrl-c: {}", e);
                        return;
                    }
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                _ = cancel_for_signal.cancelled() => {}
            }
        });

        // the reconnect loop has no cancellation, so it is started exactly once here
        let logs = Arc::clone(&self.logs);
        let socket_status = Arc::clone(&self.socket_status);
        let socket = open_log_socket(
            self.endpoints.log_socket(),
            move |record| with_log_view(&logs, |view| view.append(record)),
            move |status| {
                socket_status.send_replace(status);
            },
            Duration::from_secs(self.config.logs.reconnect_seconds),
        );
        tracing::debug!("Log socket started for {}", socket.url());

        let activation = activation::spawn_activation(
            self.sections.subscribe(),
            Arc::clone(&self.engine),
            Arc::clone(&self.history),
            self.cancel.clone(),
        );

        if let Some(dashboard_state) = self.dashboard_state() {
            let dashboard_port = self.config.dashboard.port;
            let cancel_for_dashboard = self.cancel.clone();

            tokio::spawn(async move {
                let router = dashboard::build_router(dashboard_state);
                let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
                tracing::info!("Dashboard listening on http://{}", addr);

                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(
                            "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                            dashboard_port,
                            e
                        );
                        return;
                    }
                };

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        cancel_for_dashboard.cancelled().await;
                    })
                    .await
                    .ok();

                tracing::debug!("Dashboard stopped");
            });
        }

        tracing::info!("Huntarr panel started against {}", self.endpoints.base());

        self.cancel.cancelled().await;
        if let Err(e) = activation.await {
            tracing::warn!("Activation task ended abnormally: {}", e);
        }
        self.engine.cleanup();
        tracing::info!("Huntarr panel stopped");

        Ok(())
    }
}
