//! Application error types

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Assignment failed: {0}")]
    Assignment(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serializable error response for the presentation layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Toml(_) => "CONFIG_ERROR",
            AppError::Fetch(_) => "FETCH_ERROR",
            AppError::Assignment(_) => "ASSIGNMENT_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        ErrorResponse::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single request against the herd backend
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("server responded with HTTP {status}")]
    Http { status: u16 },

    #[error("unexpected response body: {message}")]
    InvalidResponse { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        FetchError::Network {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        FetchError::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network { .. } => ErrorKind::NetworkError,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Http { .. } => ErrorKind::HttpError,
            FetchError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured bound; the poller reports its own
            FetchError::Timeout { timeout_ms: 0 }
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            FetchError::invalid_response(err.to_string())
        } else {
            FetchError::network(err.to_string())
        }
    }
}

/// The two remote collections a poll cycle loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Horses,
    UnassignedDevices,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Horses => f.write_str("horses"),
            Collection::UnassignedDevices => f.write_str("unassigned devices"),
        }
    }
}

/// Error kinds surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NetworkError,
    Timeout,
    HttpError,
    InvalidResponse,
    PartialFailure,
}

/// Outcome error of one poll cycle
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollError {
    #[error(transparent)]
    Fetch(FetchError),

    #[error("failed to load {failed}: {cause}")]
    PartialFailure {
        failed: Collection,
        cause: FetchError,
    },
}

impl PollError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::Fetch(e) => e.kind(),
            PollError::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }
}

/// Failure reported by a location source
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("timed out waiting for a position fix")]
    Timeout,

    #[error("location capability not available on this platform")]
    Unsupported,

    #[error("location error: {0}")]
    Unknown(String),
}
