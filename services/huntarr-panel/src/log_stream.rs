//! Reconnecting WebSocket client for the backend log stream

use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::log_view::LogRecord;

/// Connection state of the log socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for SocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketStatus::Connecting => "connecting",
            SocketStatus::Connected => "connected",
            SocketStatus::Disconnected => "disconnected",
            SocketStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Handle to the background reconnect loop
#[derive(Debug)]
pub struct LogSocketHandle {
    url: Url,
    task: JoinHandle<()>,
}

impl LogSocketHandle {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Decode one text frame; anything that is not a JSON record becomes an info line
pub fn parse_frame(text: &str) -> LogRecord {
    match serde_json::from_str::<LogRecord>(text) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!("Non-JSON log frame ({}); showing raw text", e);
            LogRecord::info(text)
        }
    }
}

/// Connect to the log socket and keep reconnecting after `backoff` forever.
///
/// Records are delivered in receive order for each connection.
pub fn open_log_socket<M, S>(
    url: Url,
    on_message: M,
    on_status: S,
    backoff: Duration,
) -> LogSocketHandle
where
    M: FnMut(LogRecord) + Send + 'static,
    S: FnMut(SocketStatus) + Send + 'static,
{
    let task = tokio::spawn(socket_loop(url.clone(), on_message, on_status, backoff));
    LogSocketHandle { url, task }
}

async fn socket_loop<M, S>(url: Url, mut on_message: M, mut on_status: S, backoff: Duration)
where
    M: FnMut(LogRecord) + Send + 'static,
    S: FnMut(SocketStatus) + Send + 'static,
{
    loop {
        on_status(SocketStatus::Connecting);
        tracing::debug!("Connecting to log socket {}", url);

        let mut ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::warn!("Log socket connect to {} failed: {}", url, e);
                on_status(SocketStatus::Error);
                tokio::time::sleep(backoff).await;
                continue;
            }
        };
        tracing::info!("Log socket connected to {}", url);
        on_status(SocketStatus::Connected);

        let status = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => on_message(parse_frame(text.as_str())),
                Some(Ok(Message::Close(_))) | None => break SocketStatus::Disconnected,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Log socket error: {}", e);
                    break SocketStatus::Error;
                }
            }
        };
        tracing::info!(
            "Log socket {}; reconnecting in {}s",
            status,
            backoff.as_secs_f64()
        );
        on_status(status);
        tokio::time::sleep(backoff).await;
    }
}
