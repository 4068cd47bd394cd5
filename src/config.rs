//! Configuration file parser for ~/.config/feedwell/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each so typos
//! do not go unnoticed.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::http::DEFAULT_MAX_BODY_BYTES;
use crate::fetch::retry::DEFAULT_ATTEMPTS;
use crate::fetch::stream::DEFAULT_ROUTE;
use crate::fetch::{FeedClient, HttpTransport, RetryPolicy, StreamTransport, Transport};
use crate::normalize::FormatOptions;

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "FEED_SERVICE_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Which channel carries calls to the fetch service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Http,
    Stream,
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the fetch service (synchronous channel).
    pub service_url: String,

    /// Channel used for fetch calls.
    pub transport: TransportKind,

    /// WebSocket endpoint of the fetch service (streaming channel).
    pub stream_url: String,

    /// Routing metadata attached to each streaming call.
    pub stream_route: String,

    /// Fetch service credential. The `FEED_SERVICE_API_KEY` env var takes precedence.
    pub api_key: Option<String>,

    /// Attempts per fetch, including the first.
    pub retries: u32,

    pub retry_min_delay_ms: u64,

    pub retry_max_delay_ms: u64,

    /// Deadline for a single transport call.
    pub request_timeout_secs: u64,

    /// Largest accepted response body on the HTTP channel.
    pub max_body_bytes: usize,

    /// Default date rendering for normalized articles.
    pub format: FormatSection,
}

/// `[format]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatSection {
    pub date_timezone: Option<String>,
    pub date_format: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".to_string(),
            transport: TransportKind::Http,
            stream_url: "ws://localhost:5001".to_string(),
            stream_route: DEFAULT_ROUTE.to_string(),
            api_key: None,
            retries: DEFAULT_ATTEMPTS,
            retry_min_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            request_timeout_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            format: FormatSection::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("service_url", &self.service_url)
            .field("transport", &self.transport)
            .field("stream_url", &self.stream_url)
            .field("stream_route", &self.stream_route)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("retries", &self.retries)
            .field("retry_min_delay_ms", &self.retry_min_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("format", &self.format)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "service_url",
        "transport",
        "stream_url",
        "stream_route",
        "api_key",
        "retries",
        "retry_min_delay_ms",
        "retry_max_delay_ms",
        "request_timeout_secs",
        "max_body_bytes",
        "format",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            transport = ?config.transport,
            service_url = %config.service_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The credential to use: env var first, then the config file.
    pub fn resolved_api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Default format options for commands that do not override them.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            date_timezone: self.format.date_timezone.clone(),
            date_format: self.format.date_format.clone(),
        }
    }

    /// Build the configured transport.
    pub fn build_transport(&self) -> Result<Arc<dyn Transport>, ConfigError> {
        let api_key = self.resolved_api_key();
        let transport: Arc<dyn Transport> = match self.transport {
            TransportKind::Http => {
                let client = reqwest::Client::builder()
                    .user_agent(concat!("feedwell/", env!("CARGO_PKG_VERSION")))
                    .build()?;
                Arc::new(
                    HttpTransport::new(client, &self.service_url)
                        .with_api_key(api_key)
                        .with_timeout(self.request_timeout())
                        .with_max_body_bytes(self.max_body_bytes),
                )
            }
            TransportKind::Stream => Arc::new(
                StreamTransport::new(&self.stream_url)
                    .with_route(self.stream_route.clone())
                    .with_api_key(api_key)
                    .with_timeout(self.request_timeout()),
            ),
        };
        Ok(transport)
    }

    /// Build a [`FeedClient`] wired to the configured transport and retry policy.
    pub fn build_client(&self) -> Result<FeedClient, ConfigError> {
        Ok(FeedClient::new(self.build_transport()?).with_retry_policy(self.retry_policy()))
    }
}

// ============================================================================
// Tests
// ============================================================================
