//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an `HttpStatus` error
    pub fn error_for_status(self, url: &str) -> crate::Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(crate::PanelError::HttpStatus {
                status: self.status,
                url: url.to_string(),
            })
        }
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request; `no_cache` asks intermediaries for a fresh copy
    async fn get(&self, url: &str, no_cache: bool) -> crate::Result<HttpResponse>;

    /// Send a POST request with a JSON body
    async fn post_json(&self, url: &str, body: &serde_json::Value)
        -> crate::Result<HttpResponse>;

    /// Send a DELETE request
    async fn delete(&self, url: &str) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest, bounded by a per-request timeout
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::PanelError::Network(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("{} {}", method, url);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                crate::PanelError::Network(format!("{} {} timed out", method, url))
            } else {
                crate::PanelError::Network(format!("{} {} failed: {}", method, url, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| crate::PanelError::Network(format!("Reading response body: {}", e)))?;

        tracing::debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, no_cache: bool) -> crate::Result<HttpResponse> {
        let mut request = self.client.get(url);
        if no_cache {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }
        self.send("GET", url, request).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        self.send("POST", url, self.client.post(url).json(body))
            .await
    }

    async fn delete(&self, url: &str) -> crate::Result<HttpResponse> {
        self.send("DELETE", url, self.client.delete(url)).await
    }
}
