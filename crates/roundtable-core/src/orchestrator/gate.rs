//! Human review of the generated analyst team

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{Analyst, Session, SessionId, SessionStatus};

/// Feedback text the backend reads as "proceed with these analysts"
pub const APPROVAL_MARKER: &str = "approve";

/// What the user decided at the review gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackAction {
    Approve,
    /// Free-text instructions for regenerating the team
    Revise(String),
}

impl FeedbackAction {
    /// Build a revision, rejecting text the backend could not act on
    pub fn revise(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation(
                "Please describe how the analysts should change".to_string(),
            ));
        }
        // The backend cannot tell this apart from an approval
        if trimmed.eq_ignore_ascii_case(APPROVAL_MARKER) {
            return Err(Error::Validation(format!(
                "'{}' is reserved for approving the analysts",
                APPROVAL_MARKER
            )));
        }
        Ok(Self::Revise(text))
    }

    /// Text sent as the `feedback` field
    pub fn wire_text(&self) -> &str {
        match self {
            Self::Approve => APPROVAL_MARKER,
            Self::Revise(text) => text,
        }
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

/// The review step for one session, present only while it is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackGate {
    pub session_id: SessionId,
    pub analysts: Vec<Analyst>,
}

impl FeedbackGate {
    /// Open when analysts exist, the backend is waiting, and nobody has answered yet
    pub fn is_open(session: &Session) -> bool {
        session.has_analysts()
            && session.status == SessionStatus::AwaitingFeedback
            && !session.has_feedback()
    }

    pub fn for_session(session: &Session) -> Option<Self> {
        Self::is_open(session).then(|| Self {
            session_id: session.id.clone(),
            analysts: session.analysts.clone(),
        })
    }
}
