use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{ChannelId, MemberId};

/// Unified error type for the watch-party service
#[derive(Error, Debug)]
pub enum WatchPartyError {
    // Lookup errors
    #[error("Channel not found: {id}")]
    ChannelNotFound { id: ChannelId },

    #[error("Member {member} not found in channel {channel}")]
    MemberNotFound { channel: ChannelId, member: MemberId },

    #[error("Not found: {0}")]
    NotFound(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Queue index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    // Identity errors
    #[error("Missing identity token")]
    MissingIdentity,

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Session errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol deviation: {0}")]
    ProtocolDeviation(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for watch-party operations
pub type Result<T> = std::result::Result<T, WatchPartyError>;

impl WatchPartyError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            WatchPartyError::InvalidRequest(_) | WatchPartyError::ProtocolDeviation(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            WatchPartyError::MissingIdentity | WatchPartyError::InvalidIdentity(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            WatchPartyError::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            WatchPartyError::ChannelNotFound { .. }
            | WatchPartyError::MemberNotFound { .. }
            | WatchPartyError::NotFound(_) => StatusCode::NOT_FOUND,

            // 406 Not Acceptable
            WatchPartyError::InvalidPayload(_) | WatchPartyError::IndexOutOfRange { .. } => {
                StatusCode::NOT_ACCEPTABLE
            }

            // 502 Bad Gateway
            WatchPartyError::Transport(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            WatchPartyError::InvalidConfig(_)
            | WatchPartyError::Io(_)
            | WatchPartyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for WatchPartyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "status": "error",
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for WatchPartyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        WatchPartyError::InvalidIdentity(err.to_string())
    }
}

impl From<axum::Error> for WatchPartyError {
    fn from(err: axum::Error) -> Self {
        WatchPartyError::Transport(err.to_string())
    }
}
