//! Error types for the stream transport

use thiserror::Error;

/// Errors raised while opening or reading a session stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Stream rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream read failed: {0}")]
    Read(String),
}

impl StreamError {
    /// HTTP status of a rejected connection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
