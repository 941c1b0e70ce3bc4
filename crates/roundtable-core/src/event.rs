//! Session stream events and the append-only event log

use chrono::{DateTime, Utc};
use roundtable_stream::Frame;
use serde::Serialize;
use serde_json::Value;

use crate::types::{SessionId, SessionStatus};

/// Kind of an event observed on a session stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Status,
    AnalystsReady,
    FeedbackReceived,
    InterviewProgress,
    ReportReady,
    Error,
    /// Keepalive; never shown to the user
    Ping,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::Message,
        Self::Status,
        Self::AnalystsReady,
        Self::FeedbackReceived,
        Self::InterviewProgress,
        Self::ReportReady,
        Self::Error,
        Self::Ping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Status => "status",
            Self::AnalystsReady => "analysts_ready",
            Self::FeedbackReceived => "feedback_received",
            Self::InterviewProgress => "interview_progress",
            Self::ReportReady => "report_ready",
            Self::Error => "error",
            Self::Ping => "ping",
        }
    }

    /// Classify a frame label. Unlabeled frames are `message`; labels outside
    /// the known set yield `None`.
    pub fn from_label(label: Option<&str>) -> Option<Self> {
        let Some(label) = label else {
            return Some(Self::Message);
        };
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }

    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Ping)
    }
}

/// Event payload: structured JSON or plain text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Structured(Value),
    Text(String),
}

impl EventPayload {
    /// Interpret raw frame data
    pub fn parse(data: &str) -> Self {
        match serde_json::from_str::<Value>(data) {
            Ok(Value::String(text)) => Self::Text(text),
            Ok(value) => Self::Structured(value),
            Err(_) => Self::Text(data.to_string()),
        }
    }

    /// The `message` field of a structured payload
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Structured(value) => value.get("message").and_then(Value::as_str),
            Self::Text(_) => None,
        }
    }

    /// The `status` field of a structured payload, when it names a known status
    pub fn status(&self) -> Option<SessionStatus> {
        match self {
            Self::Structured(value) => value
                .get("status")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            Self::Text(_) => None,
        }
    }

    /// Display text: the `message` field when present, otherwise the whole payload
    pub fn summary(&self) -> String {
        if let Some(message) = self.message() {
            return message.to_string();
        }
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// One event observed on a session stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    /// Position in the log, starting at zero
    pub seq: u64,
    pub session_id: SessionId,
    pub kind: EventKind,
    pub payload: EventPayload,
    /// Client-side observation time
    pub observed_at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn summary(&self) -> String {
        self.payload.summary()
    }
}

/// Classify a raw frame, returning `None` for unknown labels
pub fn classify(frame: &Frame) -> Option<(EventKind, EventPayload)> {
    let kind = EventKind::from_label(frame.label())?;
    Some((kind, EventPayload::parse(&frame.data)))
}

/// Append-only log of events for one session.
///
/// Arrival order is the only ordering; entries are never reordered or
/// removed. Switching sessions replaces the whole log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    session_id: Option<SessionId>,
    events: Vec<SessionEvent>,
}

impl EventLog {
    /// Empty log not bound to any session
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            events: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Append an event; returns `None` if the log is not bound to a session
    pub fn append(
        &mut self,
        kind: EventKind,
        payload: EventPayload,
        observed_at: DateTime<Utc>,
    ) -> Option<&SessionEvent> {
        let session_id = self.session_id.clone()?;
        let seq = self.events.len() as u64;
        self.events.push(SessionEvent {
            seq,
            session_id,
            kind,
            payload,
            observed_at,
        });
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every event including keepalives
    pub fn all(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Events a user may see, in arrival order
    pub fn visible(&self) -> impl Iterator<Item = &SessionEvent> {
        self.events.iter().filter(|e| e.kind.is_user_visible())
    }
}
