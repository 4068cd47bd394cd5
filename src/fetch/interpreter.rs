use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::FetchError;
use super::transport::RawResponse;

/// Origin response relayed by the fetch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
}

/// Wrapper the fetch service puts around every answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request_status: String,
    #[serde(default)]
    pub response: Option<FeedResponse>,
}

/// Non-error result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FeedResponse),
    /// The service queued the fetch but has not completed it. Ask again later.
    Pending,
}

/// `requestStatus` tags of the fetch service protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestStatus {
    Success,
    Pending,
    InternalError,
    ParseError,
    FetchError,
    BadStatusCode,
    FetchTimeout,
}

impl RequestStatus {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "success" => Some(Self::Success),
            "pending" => Some(Self::Pending),
            "internal_error" => Some(Self::InternalError),
            "parse_error" => Some(Self::ParseError),
            "fetch_error" => Some(Self::FetchError),
            "bad_status_code" => Some(Self::BadStatusCode),
            "fetch_timeout" => Some(Self::FetchTimeout),
            _ => None,
        }
    }
}

/// Maps a transport response onto the typed outcome set.
///
/// # Errors
///
/// - [`FetchError::ServerStatus`] when the service answered outside 2xx; the body is
///   decoded best-effort for diagnostics and replaced by `{}` if that fails
/// - [`FetchError::Internal`] for `internal_error`, an unknown tag, or an envelope
///   that cannot be decoded
/// - [`FetchError::Parse`], [`FetchError::Fetch`], [`FetchError::Timeout`] for the
///   matching service tags
/// - [`FetchError::BadStatusCode`] with the origin status for `bad_status_code`
pub fn interpret(response: &RawResponse) -> Result<FetchOutcome, FetchError> {
    if !response.is_success() {
        let body = response
            .decode::<serde_json::Value>()
            .unwrap_or_else(|_| json!({}));
        return Err(FetchError::ServerStatus {
            status: response.status(),
            body,
        });
    }

    let envelope: Envelope = response
        .decode()
        .map_err(|e| FetchError::Internal(format!("undecodable response envelope: {e}")))?;

    let Some(status) = RequestStatus::from_tag(&envelope.request_status) else {
        return Err(FetchError::Internal(format!(
            "unexpected request status '{}'",
            envelope.request_status
        )));
    };

    tracing::debug!(request_status = %envelope.request_status, "Feed service replied");

    match status {
        RequestStatus::InternalError => Err(FetchError::Internal(
            "feed service reported an internal error".to_string(),
        )),
        RequestStatus::ParseError => Err(FetchError::Parse),
        RequestStatus::FetchError => Err(FetchError::Fetch),
        RequestStatus::BadStatusCode => match envelope.response {
            Some(origin) => Err(FetchError::BadStatusCode(origin.status_code)),
            None => Err(FetchError::Internal(
                "bad_status_code reply without a response object".to_string(),
            )),
        },
        RequestStatus::Pending => Ok(FetchOutcome::Pending),
        RequestStatus::Success => match envelope.response {
            Some(origin) => Ok(FetchOutcome::Success(origin)),
            None => Err(FetchError::Internal(
                "success reply without a response object".to_string(),
            )),
        },
        RequestStatus::FetchTimeout => Err(FetchError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> RawResponse {
        RawResponse::new(200, body)
    }

    #[test]
    fn test_pending_is_not_an_error() {
        let outcome = interpret(&ok(r#"{"requestStatus":"pending"}"#)).unwrap();
        assert_eq!(outcome, FetchOutcome::Pending);
    }

    #[test]
    fn test_success_returns_origin_response() {
        let outcome = interpret(&ok(
            r#"{"requestStatus":"success","response":{"statusCode":200,"body":"<rss/>"}}"#,
        ))
        .unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Success(FeedResponse {
                status_code: 200,
                body: "<rss/>".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_status_code_carries_origin_status() {
        let result = interpret(&ok(
            r#"{"requestStatus":"bad_status_code","response":{"statusCode":429}}"#,
        ));
        assert!(matches!(result, Err(FetchError::BadStatusCode(429))));
    }

    #[test]
    fn test_service_failure_tags() {
        assert!(matches!(
            interpret(&ok(r#"{"requestStatus":"internal_error"}"#)),
            Err(FetchError::Internal(_))
        ));
        assert!(matches!(
            interpret(&ok(r#"{"requestStatus":"parse_error"}"#)),
            Err(FetchError::Parse)
        ));
        assert!(matches!(
            interpret(&ok(r#"{"requestStatus":"fetch_error"}"#)),
            Err(FetchError::Fetch)
        ));
        assert!(matches!(
            interpret(&ok(r#"{"requestStatus":"fetch_timeout"}"#)),
            Err(FetchError::Timeout)
        ));
    }

    #[test]
    fn test_unknown_tag_names_the_tag() {
        match interpret(&ok(r#"{"requestStatus":"exploded"}"#)) {
            Err(FetchError::Internal(msg)) => assert!(msg.contains("exploded")),
            other => panic!("Expected Internal error, got {:?}", other),
        }
    }

    #[test]
    fn test_server_status_with_json_body() {
        let response = RawResponse::new(503, r#"{"message":"maintenance"}"#);
        match interpret(&response) {
            Err(FetchError::ServerStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body["message"], "maintenance");
            }
            other => panic!("Expected ServerStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_server_status_with_garbage_body_uses_empty_object() {
        let response = RawResponse::new(500, "<html>oops</html>");
        match interpret(&response) {
            Err(FetchError::ServerStatus { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, json!({}));
            }
            other => panic!("Expected ServerStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_envelope_is_internal() {
        assert!(matches!(
            interpret(&ok("not json")),
            Err(FetchError::Internal(_))
        ));
    }

    #[test]
    fn test_success_without_response_is_internal() {
        assert!(matches!(
            interpret(&ok(r#"{"requestStatus":"success"}"#)),
            Err(FetchError::Internal(_))
        ));
    }
}
