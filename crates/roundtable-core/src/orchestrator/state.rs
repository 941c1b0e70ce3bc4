//! Orchestration state and its transitions
//!
//! Every transition is synchronous and returns the [`Effect`]s the
//! controller has to carry out. Nothing in here performs I/O, so ordering
//! and staleness rules can be tested without a runtime.
//!
//! Two counters make late results harmless:
//! - the selection `epoch` grows on every selection change; fetch results
//!   tagged with an older epoch are dropped.
//! - the stream `connection` grows on every open; signals from any other
//!   connection are dropped.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::gate::{FeedbackAction, FeedbackGate};
use super::registry::SessionRegistry;
use super::report::ReportHolder;
use super::subscriber::StreamSignal;
use super::types::{CloseReason, OrchestratorOutput, Snapshot, StreamStatus};
use crate::error::{Error, Result};
use crate::event::{EventKind, EventLog, classify};
use crate::notification::{Notification, Notifications};
use crate::types::{Report, Session, SessionId, SessionStatus};

/// What prompted a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCause {
    Selection,
    AnalystsReady,
    ReportReady,
    /// Detail came back `completed`
    CompletedStatus,
}

/// Work the controller performs on behalf of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadDetail {
        id: SessionId,
        epoch: u64,
        request: u64,
        cause: LoadCause,
    },
    LoadReport {
        id: SessionId,
        epoch: u64,
        cause: LoadCause,
    },
    /// Release whatever connection is held, then open one for `id`
    OpenStream { id: SessionId, connection: u64 },
    CloseStream { connection: u64 },
    Emit(OrchestratorOutput),
}

#[derive(Debug)]
pub struct OrchestratorState {
    registry: SessionRegistry,
    selection: Option<SessionId>,
    epoch: u64,
    detail: Option<Session>,
    provisional: bool,
    detail_requested: u64,
    detail_applied: u64,
    events: EventLog,
    report: ReportHolder,
    stream: StreamStatus,
    connection: u64,
    feedback_pending: bool,
    notifications: Notifications,
}

impl OrchestratorState {
    pub fn new(notification_limit: usize) -> Self {
        Self {
            registry: SessionRegistry::new(),
            selection: None,
            epoch: 0,
            detail: None,
            provisional: false,
            detail_requested: 0,
            detail_applied: 0,
            events: EventLog::new(),
            report: ReportHolder::new(),
            stream: StreamStatus::Closed,
            connection: 0,
            feedback_pending: false,
            notifications: Notifications::new(notification_limit),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn selection(&self) -> Option<&SessionId> {
        self.selection.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn detail(&self) -> Option<&Session> {
        self.detail.as_ref()
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Report of the selected session, if one has been fetched
    pub fn report(&self) -> Option<&Report> {
        self.selection.as_ref().and_then(|id| self.report.get(id))
    }

    pub fn stream(&self) -> &StreamStatus {
        &self.stream
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn gate(&self) -> Option<FeedbackGate> {
        if self.feedback_pending {
            return None;
        }
        self.detail.as_ref().and_then(FeedbackGate::for_session)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sessions: self.registry.sessions().to_vec(),
            selection: self.selection.clone(),
            detail: self.detail.clone(),
            provisional: self.provisional,
            events: self.events.visible().cloned().collect(),
            report: self.report().cloned(),
            gate: self.gate(),
            notifications: self.notifications.iter().cloned().collect(),
            stream: self.stream.clone(),
        }
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        self.notifications.dismiss(id)
    }

    fn notify(&mut self, notification: Notification) -> Effect {
        self.notifications.push(notification.clone());
        Effect::Emit(OrchestratorOutput::Notification { notification })
    }

    fn notify_failure(&mut self, context: &str, error: &Error) -> Effect {
        let message = failure_message(context, error);
        warn!("{}", message);
        self.notify(Notification::error(message))
    }

    fn sessions_changed(&self) -> Effect {
        Effect::Emit(OrchestratorOutput::SessionsChanged {
            sessions: self.registry.sessions().to_vec(),
        })
    }

    fn request_detail(&mut self, id: SessionId, cause: LoadCause) -> Effect {
        self.detail_requested += 1;
        Effect::LoadDetail {
            id,
            epoch: self.epoch,
            request: self.detail_requested,
            cause,
        }
    }

    fn open_stream(&mut self, id: SessionId) -> Effect {
        self.connection += 1;
        self.stream = StreamStatus::Connecting(id.clone());
        Effect::OpenStream {
            id,
            connection: self.connection,
        }
    }

    fn close_stream(&mut self, reason: CloseReason) -> Vec<Effect> {
        let Some(session_id) = self.stream.session_id().cloned() else {
            return Vec::new();
        };
        if reason.is_failure() {
            warn!("Stream for session {} closed: {:?}", session_id, reason);
        } else {
            info!("Stream for session {} closed: {:?}", session_id, reason);
        }
        self.stream = StreamStatus::Closed;
        vec![
            Effect::CloseStream {
                connection: self.connection,
            },
            Effect::Emit(OrchestratorOutput::StreamClosed { session_id, reason }),
        ]
    }

    fn is_current(&self, id: &SessionId, epoch: u64) -> bool {
        epoch == self.epoch && self.selection.as_ref() == Some(id)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    pub fn sessions_loaded(&mut self, sessions: Vec<Session>) -> Vec<Effect> {
        debug!("Loaded {} sessions", sessions.len());
        self.registry.replace_all(sessions);
        vec![self.sessions_changed()]
    }

    pub fn sessions_failed(&mut self, error: &Error) -> Vec<Effect> {
        vec![self.notify_failure("Failed to load sessions", error)]
    }

    pub fn session_created(&mut self, session: Session) -> Vec<Effect> {
        info!("Created session {}", session.id);
        let id = session.id.clone();
        self.registry.prepend(session);

        let mut effects = vec![
            self.sessions_changed(),
            self.notify(Notification::success("Research started!")),
        ];
        effects.extend(self.select(Some(id)));
        effects
    }

    pub fn create_failed(&mut self, error: &Error) -> Vec<Effect> {
        vec![self.notify_failure("Failed to start research", error)]
    }

    /// The entry that a delete would remove
    pub fn removal_target(&self, id: &SessionId) -> Result<&Session> {
        self.registry
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Session {} is not in the list", id)))
    }

    pub fn session_removed(&mut self, id: &SessionId) -> Vec<Effect> {
        info!("Deleted session {}", id);
        self.registry.remove(id);

        let mut effects = vec![
            self.sessions_changed(),
            self.notify(Notification::success("Session deleted")),
        ];
        if self.selection.as_ref() == Some(id) {
            effects.extend(self.select(None));
        }
        effects
    }

    pub fn remove_failed(&mut self, error: &Error) -> Vec<Effect> {
        vec![self.notify_failure("Failed to delete session", error)]
    }

    // ------------------------------------------------------------------
    // Selection and detail
    // ------------------------------------------------------------------

    /// Switch the selected session. Reselecting the current one does nothing.
    pub fn select(&mut self, id: Option<SessionId>) -> Vec<Effect> {
        if self.selection == id {
            return Vec::new();
        }

        let mut effects = self.close_stream(CloseReason::SelectionChanged);

        self.epoch += 1;
        self.selection = id.clone();
        self.detail = None;
        self.provisional = false;
        self.feedback_pending = false;
        self.report.reset();
        self.events = match &id {
            Some(id) => EventLog::for_session(id.clone()),
            None => EventLog::new(),
        };

        match &id {
            Some(id) => info!("Selected session {}", id),
            None => info!("Selection cleared"),
        }
        effects.push(Effect::Emit(OrchestratorOutput::SelectionChanged {
            session_id: id.clone(),
        }));

        if let Some(id) = id {
            effects.push(self.request_detail(id.clone(), LoadCause::Selection));
            effects.push(self.open_stream(id));
        }
        effects
    }

    pub fn detail_loaded(
        &mut self,
        id: &SessionId,
        epoch: u64,
        request: u64,
        cause: LoadCause,
        session: Session,
    ) -> Vec<Effect> {
        if !self.is_current(id, epoch) {
            debug!("Dropping detail for session {} from an old selection", id);
            return Vec::new();
        }
        if request < self.detail_applied {
            debug!("Dropping out-of-order detail for session {}", id);
            return Vec::new();
        }
        self.detail_applied = request;

        let mut effects = Vec::new();
        if self.registry.patch(&session) {
            effects.push(self.sessions_changed());
        }

        let status = session.status;
        self.detail = Some(session.clone());
        self.provisional = false;
        effects.push(Effect::Emit(OrchestratorOutput::DetailChanged {
            session,
            provisional: false,
        }));

        if status == SessionStatus::Completed {
            // A report_ready load already has its own report fetch in flight
            if cause != LoadCause::ReportReady && self.report.needs_fetch(id, false) {
                self.report.begin_fetch();
                effects.push(Effect::LoadReport {
                    id: id.clone(),
                    epoch,
                    cause: LoadCause::CompletedStatus,
                });
            }
        } else if self.report.clear() {
            effects.push(Effect::Emit(OrchestratorOutput::ReportChanged { report: None }));
        }
        effects
    }

    pub fn detail_failed(
        &mut self,
        id: &SessionId,
        epoch: u64,
        request: u64,
        error: &Error,
    ) -> Vec<Effect> {
        if !self.is_current(id, epoch) || request < self.detail_applied {
            return Vec::new();
        }
        let context = "Failed to load session details";
        vec![
            self.notify_failure(context, error),
            Effect::Emit(OrchestratorOutput::DetailFailed {
                session_id: id.clone(),
                message: failure_message(context, error),
            }),
        ]
    }

    pub fn report_loaded(
        &mut self,
        id: &SessionId,
        epoch: u64,
        report: Option<Report>,
    ) -> Vec<Effect> {
        if !self.is_current(id, epoch) {
            debug!("Dropping report for session {} from an old selection", id);
            return Vec::new();
        }
        if report.is_none() {
            debug!("Report for session {} not produced yet", id);
        }
        if self.report.complete(id, report) {
            return vec![Effect::Emit(OrchestratorOutput::ReportChanged {
                report: self.report.get(id).cloned(),
            })];
        }
        Vec::new()
    }

    pub fn report_failed(&mut self, id: &SessionId, epoch: u64, error: &Error) -> Vec<Effect> {
        if !self.is_current(id, epoch) {
            return Vec::new();
        }
        self.report.fail();
        vec![self.notify_failure("Failed to load report", error)]
    }

    // ------------------------------------------------------------------
    // Live stream
    // ------------------------------------------------------------------

    pub fn stream_signal(
        &mut self,
        connection: u64,
        signal: StreamSignal,
        observed_at: DateTime<Utc>,
    ) -> Vec<Effect> {
        if connection != self.connection || self.stream.is_closed() {
            debug!("Dropping signal from stale connection {}", connection);
            return Vec::new();
        }

        match signal {
            StreamSignal::Connected => self.stream_connected(),
            StreamSignal::Frame(frame) => {
                let Some((kind, payload)) = classify(&frame) else {
                    debug!("Ignoring frame with unknown label {:?}", frame.label);
                    return Vec::new();
                };
                self.stream_event(kind, payload, observed_at)
            }
            StreamSignal::Failed(message) => {
                let mut effects = self.close_stream(CloseReason::Failed(message.clone()));
                effects.push(self.notify(Notification::error(format!(
                    "Live updates disconnected: {}",
                    message
                ))));
                effects
            }
            StreamSignal::Ended => self.close_stream(CloseReason::Ended),
        }
    }

    fn stream_connected(&mut self) -> Vec<Effect> {
        let StreamStatus::Connecting(id) = &self.stream else {
            return Vec::new();
        };
        let id = id.clone();
        info!("Stream for session {} open", id);
        self.stream = StreamStatus::Open(id.clone());
        vec![Effect::Emit(OrchestratorOutput::StreamOpened { session_id: id })]
    }

    fn stream_event(
        &mut self,
        kind: EventKind,
        payload: crate::event::EventPayload,
        observed_at: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(id) = self.selection.clone() else {
            return Vec::new();
        };
        debug!("Session {} event: {}", id, kind.as_str());

        let summary = payload.summary();
        let mut effects = Vec::new();
        if let Some(event) = self.events.append(kind, payload, observed_at) {
            if kind.is_user_visible() {
                effects.push(Effect::Emit(OrchestratorOutput::EventAppended {
                    event: event.clone(),
                }));
            }
        }

        match kind {
            EventKind::AnalystsReady => {
                effects.push(self.request_detail(id, LoadCause::AnalystsReady));
            }
            EventKind::ReportReady => {
                self.report.begin_fetch();
                effects.push(Effect::LoadReport {
                    id: id.clone(),
                    epoch: self.epoch,
                    cause: LoadCause::ReportReady,
                });
                effects.push(self.request_detail(id, LoadCause::ReportReady));
            }
            EventKind::Error => {
                effects.extend(self.close_stream(CloseReason::ServerError(summary.clone())));
                effects.push(self.notify(Notification::error(summary)));
            }
            EventKind::Message
            | EventKind::Status
            | EventKind::FeedbackReceived
            | EventKind::InterviewProgress
            | EventKind::Ping => {}
        }
        effects
    }

    /// Reopen the stream for the selected session after it closed.
    /// The event log is kept and new events are appended to it.
    pub fn reconnect(&mut self) -> Result<Vec<Effect>> {
        let Some(id) = self.selection.clone() else {
            return Err(Error::Validation("No session selected".to_string()));
        };
        if !self.stream.is_closed() {
            return Ok(Vec::new());
        }
        info!("Reconnecting stream for session {}", id);
        Ok(vec![self.open_stream(id)])
    }

    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.close_stream(CloseReason::Shutdown)
    }

    // ------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------

    /// Check the gate and mark a submission in flight. Returns the epoch to
    /// tag the result with.
    pub fn begin_feedback(&mut self, id: &SessionId, action: &FeedbackAction) -> Result<u64> {
        let open = self.selection.as_ref() == Some(id)
            && self
                .detail
                .as_ref()
                .is_some_and(|d| &d.id == id && FeedbackGate::is_open(d));
        if !open || self.feedback_pending {
            return Err(Error::GateClosed(id.clone()));
        }

        debug!("Submitting feedback for session {}: {:?}", id, action);
        self.feedback_pending = true;
        Ok(self.epoch)
    }

    /// A submission refused before any request went out
    pub fn feedback_rejected(&mut self, error: &Error) -> Vec<Effect> {
        vec![self.notify_failure("Cannot submit feedback", error)]
    }

    pub fn feedback_failed(&mut self, epoch: u64, error: &Error) -> Vec<Effect> {
        if epoch == self.epoch {
            self.feedback_pending = false;
        }
        vec![self.notify_failure("Failed to submit feedback", error)]
    }

    /// Apply the accepted feedback as a provisional overlay on the detail.
    /// The next authoritative fetch replaces it.
    pub fn feedback_submitted(&mut self, id: &SessionId, epoch: u64, text: String) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.is_current(id, epoch) {
            self.feedback_pending = false;
            let patched = match self.detail.as_mut() {
                Some(detail) if &detail.id == id => {
                    detail.status = SessionStatus::Running;
                    detail.human_analyst_feedback = Some(text);
                    Some(detail.clone())
                }
                _ => None,
            };

            if let Some(session) = patched {
                self.provisional = true;
                if self.registry.patch(&session) {
                    effects.push(self.sessions_changed());
                }
                effects.push(Effect::Emit(OrchestratorOutput::DetailChanged {
                    session,
                    provisional: true,
                }));
            }
        }

        effects.push(self.notify(Notification::success("Feedback submitted")));
        effects
    }
}

/// Backend rejections already read well on their own
fn failure_message(context: &str, error: &Error) -> String {
    match error {
        Error::Http { .. } | Error::Validation(_) => error.user_message(),
        other => format!("{}: {}", context, other.user_message()),
    }
}
