//! `HttpClient` backed by reqwest.
//!
//! Retries 429 and 5xx responses and transport failures according to the
//! caller's [`RetryPolicy`]. A `Retry-After` header in seconds overrides the
//! computed backoff, capped at the policy's maximum delay. Once attempts run
//! out, the last response is returned unchanged so adapters can map its
//! status.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("cloud-music-core/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Desktop HTTP client: rustls, pooled connections, policy-driven retries.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Client whose requests time out after `timeout` unless the request
    /// sets its own.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map(Self::with_client)
            .map_err(|e| BridgeError::NotAvailable(format!("reqwest client: {}", e)))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::transport_error(&request.url, e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(&request.url, e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(url: &str, error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(host_of(url).to_string())
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("connection to {} failed", host_of(url)))
        } else {
            BridgeError::OperationFailed(error.without_url().to_string())
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Delay requested by a `Retry-After: <seconds>` header.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .headers
        .get("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Host part of `url`, for logs. Paths can carry file names.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send_once(&request).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let host = host_of(&request.url).to_string();

        for attempt in 1..=max_attempts {
            let last = attempt == max_attempts;
            let delay = match self.send_once(&request).await {
                Ok(response) if last || !is_retryable_status(response.status) => {
                    return Ok(response);
                }
                Ok(response) => {
                    warn!(%host, status = response.status, attempt, "Retryable HTTP status");
                    retry_after(&response)
                        .map(|d| d.min(policy.max_delay))
                        .unwrap_or_else(|| policy.delay_for(attempt))
                }
                Err(e) if last => return Err(e),
                Err(e) => {
                    warn!(%host, error = %e, attempt, "HTTP transport failure");
                    policy.delay_for(attempt)
                }
            };

            debug!(%host, delay_ms = delay.as_millis() as u64, "Backing off");
            sleep(delay).await;
        }

        Err(BridgeError::OperationFailed(format!(
            "no attempt was made for {}",
            host
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response_with(headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: 429,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
        assert!(ReqwestHttpClient::with_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Post), reqwest::Method::POST);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(409));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn test_retry_after_header() {
        assert_eq!(
            retry_after(&response_with(&[("retry-after", " 7 ")])),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            retry_after(&response_with(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")])),
            None
        );
        assert_eq!(retry_after(&response_with(&[])), None);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://api.dropboxapi.com/2/files/list_folder"),
            "api.dropboxapi.com"
        );
        assert_eq!(
            host_of("https://cloud-api.yandex.net?path=disk:/a.mp3"),
            "cloud-api.yandex.net"
        );
        assert_eq!(host_of("localhost:8080/x"), "localhost:8080");
    }
}
