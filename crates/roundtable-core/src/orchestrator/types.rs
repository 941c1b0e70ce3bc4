//! Types the orchestrator publishes to frontends

use serde::Serialize;

use super::gate::FeedbackGate;
use crate::event::SessionEvent;
use crate::notification::Notification;
use crate::types::{Report, Session, SessionId, SessionStatus};

/// Live stream state for the selected session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "session_id", rename_all = "snake_case")]
pub enum StreamStatus {
    Closed,
    /// Requested, waiting for the backend to accept the connection
    Connecting(SessionId),
    Open(SessionId),
}

impl StreamStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Session the stream addresses, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Closed => None,
            Self::Connecting(id) | Self::Open(id) => Some(id),
        }
    }
}

/// Why a stream stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum CloseReason {
    /// The backend finished sending
    Ended,
    /// The backend reported a pipeline error
    ServerError(String),
    /// Connection could not be opened or broke
    Failed(String),
    SelectionChanged,
    Shutdown,
}

impl CloseReason {
    /// Whether the user has to reconnect to see further events
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ServerError(_) | Self::Failed(_))
    }
}

/// Update published after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorOutput {
    SessionsChanged { sessions: Vec<Session> },
    SelectionChanged { session_id: Option<SessionId> },
    DetailChanged { session: Session, provisional: bool },
    /// Loading the selected session failed; `message` is what the user sees
    DetailFailed { session_id: SessionId, message: String },
    EventAppended { event: SessionEvent },
    ReportChanged { report: Option<Report> },
    StreamOpened { session_id: SessionId },
    StreamClosed { session_id: SessionId, reason: CloseReason },
    Notification { notification: Notification },
}

/// Immutable copy of everything a frontend renders
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub sessions: Vec<Session>,
    pub selection: Option<SessionId>,
    pub detail: Option<Session>,
    /// The detail carries local feedback not yet confirmed by a fetch
    pub provisional: bool,
    /// Events in arrival order, keepalives excluded
    pub events: Vec<SessionEvent>,
    pub report: Option<Report>,
    pub gate: Option<FeedbackGate>,
    pub notifications: Vec<Notification>,
    pub stream: StreamStatus,
}

impl Snapshot {
    pub fn status(&self) -> Option<SessionStatus> {
        self.detail.as_ref().map(|s| s.status)
    }

    /// Whether live progress is worth showing
    pub fn progress_visible(&self) -> bool {
        let running = self.status() == Some(SessionStatus::Running);
        let completed = self.status() == Some(SessionStatus::Completed);
        (running || !self.events.is_empty()) && !completed
    }

    pub fn gate_open(&self) -> bool {
        self.gate.is_some()
    }
}
