//! Error types for the broadcast control capability.

use thiserror::Error;

/// Errors that can occur while driving the broadcast backend.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Connection to the backend failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection to the backend was lost.
    #[error("Connection lost")]
    ConnectionLost,

    /// Authentication against the backend failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid backend URL.
    #[error("Invalid control URL: {0}")]
    InvalidUrl(String),

    /// The backend refused a request.
    #[error("Request refused (code {code}): {message}")]
    RequestFailed {
        /// obs-websocket request status code.
        code: i64,

        /// Human-readable refusal comment.
        message: String,
    },

    /// No response arrived within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend sent a payload we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
