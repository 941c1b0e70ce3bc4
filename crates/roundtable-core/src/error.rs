//! Error types for Roundtable Core

use roundtable_stream::StreamError;
use thiserror::Error;

use crate::types::SessionId;

/// Result type alias using Roundtable Error
pub type Result<T> = std::result::Result<T, Error>;

/// Roundtable error types
///
/// Failures are scoped to the action that produced them. Only `Shutdown`
/// means the orchestrator stopped serving.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request failed with status {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Feedback is not expected for session {0}")]
    GateClosed(SessionId),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Orchestrator has shut down")]
    Shutdown,
}

impl Error {
    /// Text suitable for a user-facing notification.
    ///
    /// Backend rejections surface the server's `detail` message verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { detail, .. } => detail.clone(),
            Self::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status of a backend rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Stream(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the orchestrator can keep serving after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
