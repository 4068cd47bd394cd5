use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Local transport failures: the fetch service could not be reached or did not
/// produce a complete response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS or body read failure on the HTTP channel.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Connection or framing failure on the streaming channel.
    #[error("Stream failed: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),
    /// The call did not complete within the configured deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The streaming connection closed before the call yielded a value.
    #[error("Stream closed before a reply arrived")]
    StreamClosed,
    /// The streaming endpoint rejected the call.
    #[error("Stream call rejected: {0}")]
    Rejected(String),
    /// Response body exceeded the configured size limit.
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// The outbound request could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns true if the failure is transient and the call should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Http(_)
            | TransportError::Stream(_)
            | TransportError::Timeout(_)
            | TransportError::StreamClosed
            | TransportError::Rejected(_) => true,
            TransportError::ResponseTooLarge(_) | TransportError::Encode(_) => false,
        }
    }
}

/// Request payload understood by the fetch service on both channels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest<'a> {
    pub url: &'a str,
    pub execute_fetch_if_not_exists: bool,
}

/// Status code plus a fully buffered body whose decoding is deferred.
///
/// The body is read off the wire once; [`RawResponse::decode`] may then be called
/// any number of times.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A channel to the fetch service.
///
/// Implementations only move bytes; interpreting the envelope is left to
/// [`interpret`](crate::fetch::interpret).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        execute_if_not_cached: bool,
    ) -> Result<RawResponse, TransportError>;
}
