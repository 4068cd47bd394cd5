use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::transport::{FeedRequest, RawResponse, Transport, TransportError};
use super::is_trusted_endpoint;

/// Path of the feed request resource on the service.
const FEED_REQUESTS_PATH: &str = "/v1/feed-requests";

/// Header carrying the service credential.
const API_KEY_HEADER: &str = "api-key";

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Synchronous request/response channel: one JSON POST per call.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpTransport {
    /// `service_url` is the base URL of the fetch service, e.g. `https://feeds.internal`.
    pub fn new(client: reqwest::Client, service_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", service_url.trim_end_matches('/'), FEED_REQUESTS_PATH),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Credential attached to each request. Only sent to HTTPS or localhost endpoints.
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        execute_if_not_cached: bool,
    ) -> Result<RawResponse, TransportError> {
        let payload = serde_json::to_vec(&FeedRequest {
            url,
            execute_fetch_if_not_exists: execute_if_not_cached,
        })?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);

        if let Some(key) = &self.api_key {
            if is_trusted_endpoint(&self.endpoint) {
                request = request.header(API_KEY_HEADER, key.expose_secret());
            } else {
                tracing::warn!(endpoint = %self.endpoint, "Not sending API key over an insecure channel");
            }
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = read_limited_bytes(response, self.max_body_bytes).await?;
            Ok::<_, TransportError>(RawResponse::new(status, body))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
