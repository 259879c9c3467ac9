//! Error types shared across the runtime.

use std::time::Duration;

use thiserror::Error;

use crate::credential::StoreError;

/// Convenience alias for HTTP-layer results.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures of the session lifecycle.
///
/// Cloneable because one refresh outcome is handed to every caller waiting
/// on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active session")]
    NoSession,

    #[error("Refresh rejected by server (HTTP {status}): {message}")]
    RefreshRejected { status: u16, message: String },

    #[error("Network error during refresh: {0}")]
    TransientNetwork(String),

    #[error("Refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Whether the session is gone and the user must sign in again.
    pub fn requires_login(&self) -> bool {
        !matches!(self, SessionError::Storage(_))
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Storage(e.to_string())
    }
}

/// Errors surfaced by [`crate::http::HttpClient`] and everything built on it.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(String),
}

impl ClientError {
    /// Terminal session failures: the UI must navigate to the login entry point.
    pub fn is_terminal_session(&self) -> bool {
        match self {
            ClientError::Unauthorized => true,
            ClientError::Session(e) => e.requires_login(),
            _ => false,
        }
    }

    /// Failures worth offering a retry for.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}
