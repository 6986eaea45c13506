use crate::types::ValidationErrors;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

pub const UNKNOWN_PATH: &str = "Unknown";
pub const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No HTTP response at all (unreachable, timeout, broken body).
    Transport,
    /// 401; drives the refresh protocol.
    Auth,
    /// Any other 4xx; shown verbatim.
    Validation,
    /// 5xx.
    Server,
}

/// Uniform failure returned for every REST call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{status} {message} ({path})")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub path: String,
    #[serde(skip)]
    transport: bool,
}

/// Error body as sent by the backend, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerErrorBody {
    message: Option<Value>,
    path: Option<String>,
    status_code: Option<u16>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            path: path.into(),
            transport: false,
        }
    }

    /// Normalize a non-2xx response. Status comes from HTTP, then from the
    /// body's `statusCode`, then defaults to 500.
    pub fn from_response(status: Option<u16>, body: &[u8]) -> Self {
        let parsed: ServerErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let message = parsed
            .message
            .as_ref()
            .and_then(message_text)
            .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());
        Self {
            status: status.or(parsed.status_code).unwrap_or(500),
            message,
            path: parsed.path.unwrap_or_else(|| UNKNOWN_PATH.to_string()),
            transport: false,
        }
    }

    /// Normalize a failure that never produced a response.
    pub fn transport(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        Self {
            status: err.status().map(|s| s.as_u16()).unwrap_or(500),
            message: if message.is_empty() {
                UNKNOWN_MESSAGE.to_string()
            } else {
                message
            },
            path: UNKNOWN_PATH.to_string(),
            transport: true,
        }
    }

    /// A 2xx body that did not match the expected shape.
    pub fn decode(err: &serde_json::Error, path: impl Into<String>) -> Self {
        Self::new(500, format!("invalid response body: {err}"), path)
    }

    pub fn kind(&self) -> ErrorKind {
        if self.transport {
            return ErrorKind::Transport;
        }
        match self.status {
            401 => ErrorKind::Auth,
            400..=499 => ErrorKind::Validation,
            _ => ErrorKind::Server,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, ThisError)]
pub enum SyncError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] SqlxError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Realtime channel error: {0}")]
    Realtime(String),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl SyncError {
    /// Message suitable for a dismissible error banner.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Api(e) => e.message.clone(),
            SyncError::Validation(e) => e.to_string(),
            SyncError::Realtime(_) => "Live updates are unavailable.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// True when the session is gone and the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, SyncError::Api(e) if e.is_unauthorized())
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            SyncError::Api(e) => Some(e),
            _ => None,
        }
    }
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            SyncError::Api(e) => matches!(e.kind(), ErrorKind::Transport | ErrorKind::Server),
            SyncError::Realtime(_) | SyncError::Io(_) => true,
            _ => false,
        }
    }
}
