//! Research backend API
//!
//! [`ResearchApi`] is the seam between the orchestrator and the backend.
//! [`HttpClient`] talks to the real REST + SSE service; tests substitute
//! an in-memory implementation.

mod http;

pub use http::HttpClient;

use async_trait::async_trait;
use roundtable_stream::FrameStream;

use crate::error::Result;
use crate::types::{CreateSessionRequest, FeedbackAck, HealthStatus, Report, Session, SessionId};

/// Operations the research backend exposes
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus>;

    /// `GET /sessions`, most recent first
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// `POST /sessions`
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session>;

    /// `GET /sessions/{id}`
    async fn get_session(&self, id: &SessionId) -> Result<Session>;

    /// `DELETE /sessions/{id}`
    async fn delete_session(&self, id: &SessionId) -> Result<()>;

    /// `GET /sessions/{id}/report`; `Ok(None)` when no report exists yet
    async fn get_report(&self, id: &SessionId) -> Result<Option<Report>>;

    /// `POST /sessions/{id}/feedback`
    async fn submit_feedback(&self, id: &SessionId, feedback: &str) -> Result<FeedbackAck>;

    /// `GET /sessions/{id}/stream`. Dropping the returned stream closes the
    /// connection.
    async fn open_stream(&self, id: &SessionId) -> Result<FrameStream>;
}
