//! Error classification for backend calls.
//!
//! Every non-2xx status and every transport failure goes through
//! [`ApiError::from_response`] / [`ApiError::network`], so call sites never
//! classify on their own.

use serde_json::Value;
use thiserror::Error;

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials.";
pub const MSG_NOT_FOUND: &str = "The requested resource was not found.";
pub const MSG_SERVER_ERROR: &str = "There was a problem with the server. Please try again later.";
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred.";
pub const MSG_NETWORK: &str = "An unexpected error occurred. Please try again later.";
pub const MSG_MISSING_CREDENTIALS: &str = "User ID or token not available";

/// Error taxonomy surfaced to workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any request.
    Validation,
    /// 401, or no session where one is required.
    Auth,
    /// 404
    NotFound,
    /// 5xx
    Server,
    /// No response received.
    Network,
    /// Anything else, including undecodable bodies.
    Unknown,
    /// Secure store read/write failed.
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Server => "server",
            Self::Network => "network",
            Self::Unknown => "unknown",
            Self::Storage => "storage",
        };
        write!(f, "{}", s)
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::Auth,
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

/// A classified failure with a user-facing message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    /// Human-readable, safe to show.
    pub message: String,
    /// Transport or decoding detail for logs.
    pub detail: Option<String>,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, MSG_NETWORK).with_detail(detail)
    }

    pub fn missing_credentials() -> Self {
        Self::new(ErrorKind::Auth, MSG_MISSING_CREDENTIALS)
    }

    pub fn storage(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message).with_detail(detail)
    }

    /// A 2xx body that did not match the expected shape.
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, MSG_UNEXPECTED).with_detail(detail)
    }

    /// A 2xx envelope that reported `status: false`.
    pub fn rejected(body: &Value) -> Self {
        let message = body_message(body).unwrap_or_else(|| MSG_UNEXPECTED.to_string());
        Self::new(ErrorKind::Unknown, message)
    }

    /// Classify a non-2xx response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let kind = classify_http_status(status);
        let message = match kind {
            ErrorKind::Auth => MSG_INVALID_CREDENTIALS.to_string(),
            ErrorKind::NotFound => MSG_NOT_FOUND.to_string(),
            ErrorKind::Server => MSG_SERVER_ERROR.to_string(),
            _ => serde_json::from_str::<Value>(body)
                .ok()
                .as_ref()
                .and_then(body_message)
                .unwrap_or_else(|| MSG_UNEXPECTED.to_string()),
        };

        Self {
            kind,
            status: Some(status),
            message,
            detail: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// `message`, then `error`, when either is a non-empty string.
fn body_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
