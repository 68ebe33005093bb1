use std::io;

use axum::http::StatusCode;

/// Errors produced by the webhook ingestion pipeline.
///
/// An unrecognized or ignorable event is not an error: the pipeline returns
/// `Ok(None)` for those.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Unauthorized webhook request: {0}")]
    Unauthorized(&'static str),

    #[error("Failed to read webhook request: {0}")]
    Transport(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
}

impl WebhookError {
    /// HTTP status a host should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Transport(_) | WebhookError::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::MalformedPayload(err.to_string())
    }
}

/// Custom error type for gateway host operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown webhook endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Cannot build hook payload: {0}")]
    HookPayload(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;
