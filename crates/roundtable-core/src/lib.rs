//! Roundtable Core - client-side orchestration for multi-analyst research
//!
//! This crate provides the core functionality for Roundtable frontends:
//! - Wire types for research sessions, analysts and reports
//! - A REST + SSE client for the research backend
//! - The session orchestrator: registry, detail loading, live stream, feedback gate
//! - Notifications and display formatting

pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod formatting;
pub mod notification;
pub mod orchestrator;
pub mod types;

pub use api::{HttpClient, ResearchApi};
pub use config::{Config, ConfigManager, GeneralConfig, ServerConfig, StreamConfig};
pub use error::{Error, Result};
pub use event::{EventKind, EventLog, EventPayload, SessionEvent};
pub use notification::{Notification, NotificationLevel, Notifications};

// Orchestrator exports
pub use orchestrator::{
    APPROVAL_MARKER, CloseReason, FeedbackAction, FeedbackGate, Orchestrator, OrchestratorHandle,
    OrchestratorOutput, OutputReceiver, Snapshot, StreamStatus,
};

pub use types::{
    Analyst, CreateSessionRequest, FeedbackAck, HealthStatus, MAX_ANALYSTS, MIN_ANALYSTS, Report,
    Session, SessionId, SessionStatus,
};

// Formatting exports
pub use formatting::{
    event_line, event_time, report_file_name, report_markdown, short_date, status_label,
    truncate_str,
};
