//! Error types for the audio node

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::protocol::Severity;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Track decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Encoded track is empty")]
    Empty,

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Read of {needed} bytes past end of buffer ({remaining} remaining)")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Invalid UTF-8 in field {0}")]
    InvalidUtf8(&'static str),

    #[error("Declared body size {declared} exceeds buffer of {available} bytes")]
    BodySize { declared: usize, available: usize },

    #[error("Track fields overrun the position offset")]
    FieldOverrun,
}

/// Track encoding errors
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Field {field} is {len} bytes, longer than 65535")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Encoded body of {0} bytes does not fit the header")]
    BodyTooLarge(usize),
}

/// Source resolution errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No source manager could handle identifier: {0}")]
    NoSource(String),

    #[error("{message}")]
    Upstream { message: String, severity: Severity },

    #[error("Failed to encode resolved track: {0}")]
    Encode(#[from] EncodeError),
}

impl SourceError {
    /// An expected, identifier-specific failure
    pub fn common(message: impl Into<String>) -> Self {
        SourceError::Upstream {
            message: message.into(),
            severity: Severity::Common,
        }
    }

    /// An unexpected failure
    pub fn fault(message: impl Into<String>) -> Self {
        SourceError::Upstream {
            message: message.into(),
            severity: Severity::Fault,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SourceError::NoSource(_) => Severity::Common,
            SourceError::Upstream { severity, .. } => *severity,
            SourceError::Encode(_) => Severity::Fault,
        }
    }
}

/// Persistent cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Decode(_) | ApiError::Encode(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON body of an error response
#[derive(serde::Serialize)]
pub struct ErrorBody {
    pub timestamp: i64,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
