//! Shared test fixtures: an in-memory research backend

#![allow(dead_code)]

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use roundtable_core::{
    Analyst, CreateSessionRequest, Error, FeedbackAck, HealthStatus, OrchestratorHandle, Report,
    ResearchApi, Result, Session, SessionId, SessionStatus, Snapshot,
};
use roundtable_stream::{Frame, FrameStream, StreamError};

type FrameSender = mpsc::UnboundedSender<std::result::Result<Frame, StreamError>>;

#[derive(Default)]
struct Backend {
    sessions: Vec<Session>,
    reports: HashMap<SessionId, Report>,
    streams: HashMap<SessionId, Vec<FrameSender>>,
    detail_delays: HashMap<SessionId, Duration>,
    report_delays: HashMap<SessionId, Duration>,
    feedback_delays: HashMap<SessionId, Duration>,
    feedback: Vec<(SessionId, String)>,
    next_id: u64,
    fail_list: Option<String>,
    fail_create: Option<(u16, String)>,
    fail_delete: bool,
    fail_stream_open: bool,
}

#[derive(Default)]
struct Counters {
    list: AtomicUsize,
    create: AtomicUsize,
    delete: AtomicUsize,
    feedback: AtomicUsize,
    streams_opened: AtomicUsize,
    detail: Mutex<HashMap<SessionId, usize>>,
    report: Mutex<HashMap<SessionId, usize>>,
}

/// Scripted backend that counts every call and every live stream
#[derive(Default)]
pub struct FakeApi {
    backend: Mutex<Backend>,
    counters: Counters,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.backend.lock().unwrap().next_id = 100;
        Arc::new(api)
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Arc<Self> {
        let api = Self::new();
        api.backend.lock().unwrap().sessions = sessions;
        api
    }

    // -- scripting --------------------------------------------------------

    pub fn set_status(&self, id: &str, status: SessionStatus) {
        let mut backend = self.backend.lock().unwrap();
        if let Some(s) = backend.sessions.iter_mut().find(|s| s.id.as_str() == id) {
            s.status = status;
        }
    }

    pub fn set_analysts(&self, id: &str, analysts: Vec<Analyst>) {
        let mut backend = self.backend.lock().unwrap();
        if let Some(s) = backend.sessions.iter_mut().find(|s| s.id.as_str() == id) {
            s.analysts = analysts;
        }
    }

    pub fn set_report(&self, id: &str, markdown: &str) {
        let report = report(id, markdown);
        self.backend
            .lock()
            .unwrap()
            .reports
            .insert(SessionId::from(id), report);
    }

    pub fn delay_detail(&self, id: &str, delay: Duration) {
        self.backend
            .lock()
            .unwrap()
            .detail_delays
            .insert(SessionId::from(id), delay);
    }

    pub fn delay_report(&self, id: &str, delay: Duration) {
        self.backend
            .lock()
            .unwrap()
            .report_delays
            .insert(SessionId::from(id), delay);
    }

    pub fn delay_feedback(&self, id: &str, delay: Duration) {
        self.backend
            .lock()
            .unwrap()
            .feedback_delays
            .insert(SessionId::from(id), delay);
    }

    pub fn fail_list(&self, message: &str) {
        self.backend.lock().unwrap().fail_list = Some(message.to_string());
    }

    pub fn fail_create(&self, status: u16, detail: &str) {
        self.backend.lock().unwrap().fail_create = Some((status, detail.to_string()));
    }

    pub fn fail_delete(&self) {
        self.backend.lock().unwrap().fail_delete = true;
    }

    pub fn fail_stream_open(&self, fail: bool) {
        self.backend.lock().unwrap().fail_stream_open = fail;
    }

    /// Send a frame on every open stream of `id`
    pub fn push(&self, id: &str, frame: Frame) {
        let backend = self.backend.lock().unwrap();
        if let Some(senders) = backend.streams.get(&SessionId::from(id)) {
            for sender in senders {
                let _ = sender.unbounded_send(Ok(frame.clone()));
            }
        }
    }

    /// Break every open stream of `id` with a read error
    pub fn break_stream(&self, id: &str, message: &str) {
        let backend = self.backend.lock().unwrap();
        if let Some(senders) = backend.streams.get(&SessionId::from(id)) {
            for sender in senders {
                let _ = sender.unbounded_send(Err(StreamError::Read(message.to_string())));
            }
        }
    }

    /// Finish every open stream of `id` normally
    pub fn end_stream(&self, id: &str) {
        self.backend
            .lock()
            .unwrap()
            .streams
            .remove(&SessionId::from(id));
    }

    // -- observation ------------------------------------------------------

    pub fn list_calls(&self) -> usize {
        self.counters.list.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn feedback_calls(&self) -> usize {
        self.counters.feedback.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self, id: &str) -> usize {
        let counts = self.counters.detail.lock().unwrap();
        counts.get(&SessionId::from(id)).copied().unwrap_or(0)
    }

    pub fn report_calls(&self, id: &str) -> usize {
        let counts = self.counters.report.lock().unwrap();
        counts.get(&SessionId::from(id)).copied().unwrap_or(0)
    }

    pub fn streams_opened(&self) -> usize {
        self.counters.streams_opened.load(Ordering::SeqCst)
    }

    /// Streams currently held open by the client
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most streams ever held open at the same time
    pub fn max_live_streams(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn submitted_feedback(&self) -> Vec<(SessionId, String)> {
        self.backend.lock().unwrap().feedback.clone()
    }

    pub fn backend_session(&self, id: &str) -> Option<Session> {
        let backend = self.backend.lock().unwrap();
        backend.sessions.iter().find(|s| s.id.as_str() == id).cloned()
    }
}

fn bump(counts: &Mutex<HashMap<SessionId, usize>>, id: &SessionId) {
    *counts.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
}

#[async_trait]
impl ResearchApi for FakeApi {
    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            service: Some("fake".to_string()),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        let backend = self.backend.lock().unwrap();
        if let Some(message) = &backend.fail_list {
            return Err(Error::Transport(message.clone()));
        }
        Ok(backend.sessions.clone())
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        let mut backend = self.backend.lock().unwrap();
        if let Some((status, detail)) = &backend.fail_create {
            return Err(Error::Http {
                status: *status,
                detail: detail.clone(),
            });
        }

        backend.next_id += 1;
        let mut created = session(&backend.next_id.to_string(), SessionStatus::Pending);
        created.topic = request.topic.clone();
        created.max_analysts = request.max_analysts;
        created.created_at = Some(Utc::now());
        backend.sessions.insert(0, created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        bump(&self.counters.detail, id);
        let delay = self.backend.lock().unwrap().detail_delays.get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let backend = self.backend.lock().unwrap();
        backend
            .sessions
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound("Session not found.".to_string()))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        let mut backend = self.backend.lock().unwrap();
        if backend.fail_delete {
            return Err(Error::Http {
                status: 500,
                detail: "Internal Server Error".to_string(),
            });
        }
        let before = backend.sessions.len();
        backend.sessions.retain(|s| &s.id != id);
        if backend.sessions.len() == before {
            return Err(Error::NotFound("Session not found.".to_string()));
        }
        backend.streams.remove(id);
        Ok(())
    }

    async fn get_report(&self, id: &SessionId) -> Result<Option<Report>> {
        bump(&self.counters.report, id);
        let delay = self.backend.lock().unwrap().report_delays.get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.backend.lock().unwrap().reports.get(id).cloned())
    }

    async fn submit_feedback(&self, id: &SessionId, feedback: &str) -> Result<FeedbackAck> {
        self.counters.feedback.fetch_add(1, Ordering::SeqCst);
        let delay = self.backend.lock().unwrap().feedback_delays.get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut backend = self.backend.lock().unwrap();
        backend.feedback.push((id.clone(), feedback.to_string()));

        let session = backend
            .sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::NotFound("Session not found.".to_string()))?;
        if session.status != SessionStatus::AwaitingFeedback {
            return Err(Error::Http {
                status: 400,
                detail: format!(
                    "Session is not awaiting feedback (current status: {}).",
                    session.status
                ),
            });
        }
        session.human_analyst_feedback = Some(feedback.to_string());
        session.status = SessionStatus::Running;

        Ok(FeedbackAck {
            message: "Feedback submitted.".to_string(),
            feedback: Some(feedback.to_string()),
        })
    }

    async fn open_stream(&self, id: &SessionId) -> Result<FrameStream> {
        let mut backend = self.backend.lock().unwrap();
        if backend.fail_stream_open {
            return Err(StreamError::Status {
                status: 404,
                body: "Session not found.".to_string(),
            }
            .into());
        }

        self.counters.streams_opened.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded();
        backend.streams.entry(id.clone()).or_default().push(tx);

        Ok(Box::pin(GuardedStream {
            rx,
            _guard: LiveGuard {
                live: self.live.clone(),
            },
        }))
    }
}

struct LiveGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Frame stream that counts itself as live until dropped
struct GuardedStream {
    rx: mpsc::UnboundedReceiver<std::result::Result<Frame, StreamError>>,
    _guard: LiveGuard,
}

impl Stream for GuardedStream {
    type Item = std::result::Result<Frame, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_next_unpin(cx)
    }
}

// -- builders ------------------------------------------------------------

pub fn session(id: &str, status: SessionStatus) -> Session {
    let day = id.parse::<u32>().map(|n| n % 28 + 1).unwrap_or(1);
    Session {
        id: SessionId::from(id),
        topic: format!("Topic {}", id),
        max_analysts: 2,
        status,
        human_analyst_feedback: None,
        created_at: Some(Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap()),
        updated_at: None,
        analysts: Vec::new(),
    }
}

pub fn analysts() -> Vec<Analyst> {
    vec![
        Analyst {
            id: "1".to_string(),
            name: "Dr. Ada Park".to_string(),
            role: "Health economist".to_string(),
            affiliation: "Policy Institute".to_string(),
            description: "Costs and access".to_string(),
        },
        Analyst {
            id: "2".to_string(),
            name: "Sam Ortiz".to_string(),
            role: "Clinician".to_string(),
            affiliation: "General Hospital".to_string(),
            description: "Patient outcomes".to_string(),
        },
        Analyst {
            id: "3".to_string(),
            name: "Priya Nair".to_string(),
            role: "ML researcher".to_string(),
            affiliation: "University Lab".to_string(),
            description: "Diagnostic models".to_string(),
        },
    ]
}

pub fn report(id: &str, markdown: &str) -> Report {
    Report {
        id: Some("1".to_string()),
        session_id: SessionId::from(id),
        introduction: None,
        content: None,
        conclusion: None,
        final_report: markdown.to_string(),
        created_at: None,
    }
}

pub fn frame(label: &str, data: &str) -> Frame {
    Frame::labeled(label, data)
}

// -- waiting -------------------------------------------------------------

/// Poll snapshots until `check` holds, failing after two seconds
pub async fn wait_until<F>(handle: &OrchestratorHandle, what: &str, check: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = handle.snapshot().await.unwrap();
        if check(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}: {:#?}", what, snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let spawned work settle
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn stream_open(snapshot: &Snapshot, id: &str) -> bool {
    matches!(&snapshot.stream, roundtable_core::StreamStatus::Open(open) if open.as_str() == id)
}
