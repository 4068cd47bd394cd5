use thiserror::Error;

use super::transport::TransportError;

/// Discriminant of [`FetchError`], for callers mapping failures to error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,
    ServerStatus,
    Internal,
    Parse,
    Fetch,
    BadStatusCode,
    Timeout,
}

/// Every way a feed fetch can fail. Pending is not among them.
///
/// Only [`FetchError::Network`] is produced locally; it is surfaced after the
/// retry budget is spent. All other variants come from a response that was
/// received and are never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch service could not be reached.
    #[error("Network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    /// The fetch service itself answered with a non-2xx status.
    #[error("Feed service returned status {status}: {body}")]
    ServerStatus {
        status: u16,
        body: serde_json::Value,
    },
    /// The fetch service reported an internal error or an unknown status tag.
    #[error("Feed service internal error: {0}")]
    Internal(String),
    /// The origin returned content that is not a valid feed.
    #[error("Feed content could not be parsed")]
    Parse,
    /// The fetch service could not reach the origin.
    #[error("Feed service failed to fetch the origin")]
    Fetch,
    /// The origin answered with a non-2xx status.
    #[error("Origin returned bad status code {0}")]
    BadStatusCode(u16),
    /// The origin did not answer in time.
    #[error("Origin request timed out")]
    Timeout,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network { .. } => FetchErrorKind::Network,
            FetchError::ServerStatus { .. } => FetchErrorKind::ServerStatus,
            FetchError::Internal(_) => FetchErrorKind::Internal,
            FetchError::Parse => FetchErrorKind::Parse,
            FetchError::Fetch => FetchErrorKind::Fetch,
            FetchError::BadStatusCode(_) => FetchErrorKind::BadStatusCode,
            FetchError::Timeout => FetchErrorKind::Timeout,
        }
    }
}
