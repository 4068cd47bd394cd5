//! Feed retrieval through the external feed request service.
//!
//! # Architecture
//!
//! ```text
//! FeedClient → RetryPolicy → Transport (http | stream) → interpret → ArticleSource → Normalizer
//! ```
//!
//! - [`transport`] - the `Transport` capability and the buffered `RawResponse`
//! - [`http`] - synchronous channel: one JSON POST per call
//! - [`stream`] - streaming channel: calls multiplexed over one WebSocket
//! - [`retry`] - bounded, jittered retries of transport failures only
//! - [`interpreter`] - maps the service envelope onto `FetchOutcome` / `FetchError`
//! - [`source`] - turns a payload into raw article records
//! - [`client`] - the article-level operations
//!
//! # Example
//!
//! ```ignore
//! use feedwell::fetch::{FeedClient, HttpTransport};
//! use feedwell::normalize::NormalizeOptions;
//!
//! let transport = HttpTransport::new(reqwest::Client::new(), "https://feeds.internal");
//! let client = FeedClient::new(Arc::new(transport));
//! let articles = client
//!     .fetch_feed_articles("https://blog.rust-lang.org/feed.xml", &NormalizeOptions::default())
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod interpreter;
pub mod retry;
pub mod source;
pub mod stream;
pub mod transport;

pub use client::{ClientError, FeedClient, FetchOptions};
pub use error::{FetchError, FetchErrorKind};
pub use http::HttpTransport;
pub use interpreter::{interpret, FeedResponse, FetchOutcome};
pub use retry::RetryPolicy;
pub use source::{ArticleSource, FeedRsSource, SourceError};
pub use stream::StreamTransport;
pub use transport::{RawResponse, Transport, TransportError};

/// Whether credentials may be sent to `endpoint`: encrypted schemes, or plain
/// schemes to a loopback host (local testing).
pub(crate) fn is_trusted_endpoint(endpoint: &str) -> bool {
    let Ok(url) = url::Url::parse(endpoint) else {
        return false;
    };

    match url.scheme() {
        "https" | "wss" => true,
        "http" | "ws" => matches!(
            url.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        ),
        _ => false,
    }
}
