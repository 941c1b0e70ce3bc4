//! Session orchestration
//!
//! Tracks research sessions, keeps one live stream for the selected
//! session, reconciles pushed events against fetched state, and gates the
//! human review step.

mod controller;
mod gate;
mod registry;
mod report;
mod state;
mod subscriber;
mod types;

pub use controller::{Orchestrator, OrchestratorHandle, OutputReceiver};
pub use gate::{APPROVAL_MARKER, FeedbackAction, FeedbackGate};
pub use registry::SessionRegistry;
pub use report::ReportHolder;
pub use state::{Effect, LoadCause, OrchestratorState};
pub use subscriber::{StreamHandle, StreamMessage, StreamSignal, StreamSubscriber};
pub use types::{CloseReason, OrchestratorOutput, Snapshot, StreamStatus};
