use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for fallible connector results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structured error envelope returned by the API.
///
/// Gemini reports errors as `{"error": {"code": 400, "message": "...",
/// "status": "INVALID_ARGUMENT"}}`; `code` here carries the `status` label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct APIError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    /// Raw response body for debugging (when available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl APIError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            raw_body: None,
        }
    }
}

impl fmt::Display for APIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{} ({}): {}", code, self.status, self.message)
        } else {
            write!(f, "{}: {}", self.status, self.message)
        }
    }
}

impl std::error::Error for APIError {}

/// Transport-level error (timeouts, DNS/TLS/connectivity).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

/// Broad transport error kinds for classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Unified error type surfaced by the connector.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("authentication failed: {0}")]
    Auth(APIError),

    #[error("content blocked: {0}")]
    PolicyBlock(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Api(APIError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Terminal failure once the retry budget is spent; wraps the last
    /// attempt's error.
    #[error("generation failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Number of attempts recorded on an exhausted-retries error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::ExhaustedRetries { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

pub(crate) fn to_transport_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_request() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    TransportError {
        kind,
        message: err.to_string(),
        source: Some(err),
    }
    .into()
}

/// Parse a non-success response body into a classified error.
///
/// Auth failures (401/403, or an API-key error label) become [`Error::Auth`];
/// everything else surfaces as [`Error::Api`].
pub(crate) fn parse_api_error(status: StatusCode, body: String) -> Error {
    let status_code = status.as_u16();
    let status_text = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    let mut api_err = APIError {
        status: status_code,
        code: None,
        message: status_text,
        raw_body: None,
    };

    if !body.is_empty() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = value.get("error").and_then(|v| v.as_object()) {
                if let Some(message) = err_obj.get("message").and_then(|v| v.as_str()) {
                    api_err.message = message.to_string();
                }
                api_err.code = err_obj
                    .get("status")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
            }
        }
        api_err.raw_body = Some(body);
    }

    classify_api_error(api_err)
}

fn classify_api_error(err: APIError) -> Error {
    let key_error = err
        .code
        .as_deref()
        .map(|code| code.contains("API_KEY") || code == "UNAUTHENTICATED" || code == "PERMISSION_DENIED")
        .unwrap_or(false);
    if err.status == 401 || err.status == 403 || key_error {
        Error::Auth(err)
    } else {
        Error::Api(err)
    }
}
