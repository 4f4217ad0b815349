//! Error types for the Guess Tunes client

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ErrorPayload;

/// Main error type for the Guess Tunes client
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with a non-2xx status
    #[error("Request failed with status {status}")]
    Status {
        /// HTTP status returned by the server
        status: StatusCode,
        /// Decoded JSON body, if the server sent one
        payload: Option<serde_json::Value>,
    },

    /// No response was received (connection refused, DNS, TLS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// `set_auth` was given a token without the identity it belongs to
    #[error("Cannot mark session as authenticated: token supplied without a user identity")]
    MissingIdentity,

    /// A 2xx response did not carry the fields the operation needs
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A header value (usually the bearer token) could not be encoded
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON encode or decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a status error
    pub fn status(status: StatusCode, payload: Option<serde_json::Value>) -> Self {
        Self::Status { status, payload }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid header error
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// HTTP status of the failed request, if the server answered
    #[must_use]
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 401 answer from the server
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.http_status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Raw JSON body of a failed request
    #[must_use]
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Status { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Body of a failed request decoded into the API error shape.
    ///
    /// Returns `None` when there is no body or it does not look like an
    /// error payload.
    #[must_use]
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        self.payload()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
