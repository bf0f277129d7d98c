//! Client error types.

use bytes::Bytes;
use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Status(#[from] ErrorResponse),

    /// The outgoing request body could not be encoded. No request was sent.
    #[error("failed to encode request: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A response body or stream event was not the expected JSON.
    #[error("failed to decode response: {source}")]
    Decode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// The raw payload that failed to decode.
        body: Bytes,
    },

    /// Connection, write, body read or timeout failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The caller cancelled the operation.
    #[error("request cancelled")]
    Cancelled,

    /// `request` was called on a session whose streaming flag is set.
    #[error("session is in streaming mode; use stream_request")]
    StreamingSession,

    /// Invalid client configuration (bad header value, bad endpoint).
    #[error("configuration error: {0}")]
    Config(String),
}

/// The four failure classes a caller has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-2xx HTTP status.
    Transport,
    /// The request could not be encoded.
    Serialization,
    /// A payload could not be decoded.
    Decode,
    /// Network, read, timeout or cancellation failure.
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Status(_) => ErrorKind::Transport,
            Error::Serialize(_) | Error::StreamingSession | Error::Config(_) => {
                ErrorKind::Serialization
            }
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Http(_) | Error::Cancelled => ErrorKind::Io,
        }
    }

    /// HTTP status code, if the server answered with a non-2xx status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status(resp) => Some(resp.status_code),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), Some(status) if status >= 500)
    }

    /// Check if this error came from cancellation or a request timeout.
    pub fn is_cancelled_or_timeout(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub(crate) fn decode(source: serde_json::Error, body: impl Into<Bytes>) -> Self {
        Error::Decode {
            source,
            body: body.into(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A non-2xx response, with the body read in full.
#[derive(Debug, Clone, Error)]
#[error("response error: statusCode: {status_code}, status: {status}")]
pub struct ErrorResponse {
    /// Status line, e.g. `400 Bad Request`.
    pub status: String,
    /// Numeric HTTP status code.
    pub status_code: u16,
    /// Raw response body.
    pub body: Bytes,
}

impl ErrorResponse {
    pub(crate) fn new(status: reqwest::StatusCode, body: Bytes) -> Self {
        Self {
            status: status.to_string(),
            status_code: status.as_u16(),
            body,
        }
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> Error {
        let status = reqwest::StatusCode::from_u16(code).unwrap();
        ErrorResponse::new(status, Bytes::from_static(b"{\"error\":\"nope\"}")).into()
    }

    #[test]
    fn test_status_line_formatting() {
        let err = status_error(400);
        assert_eq!(
            err.to_string(),
            "response error: statusCode: 400, status: 400 Bad Request"
        );
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_status_classification() {
        assert!(status_error(401).is_auth_error());
        assert!(status_error(429).is_rate_limited());
        assert!(status_error(503).is_server_error());
        assert!(!status_error(400).is_server_error());
    }

    #[test]
    fn test_decode_kind_keeps_body() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::decode(source, "{oops");
        assert_eq!(err.kind(), ErrorKind::Decode);
        match err {
            Error::Decode { body, .. } => assert_eq!(&body[..], b"{oops"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_is_io() {
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Io);
        assert!(Error::Cancelled.is_cancelled_or_timeout());
        assert_eq!(Error::Cancelled.status_code(), None);
    }

    #[test]
    fn test_body_text_is_lossy() {
        let resp = ErrorResponse {
            status: "500 Internal Server Error".to_string(),
            status_code: 500,
            body: Bytes::from_static(b"bad \xff body"),
        };
        assert_eq!(resp.body_text(), "bad \u{fffd} body");
    }
}
