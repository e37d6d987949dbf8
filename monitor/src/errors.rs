//! Error types for the refresh monitor

use thiserror::Error;

/// Main error type for the refresh monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Malformed payload: {0}")]
    PayloadError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Internal(err.to_string())
    }
}
