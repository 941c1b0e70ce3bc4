//! Roundtable Stream - server-sent event transport
//!
//! This crate opens the per-session push connection exposed by the research
//! backend (`GET /sessions/{id}/stream`) and turns the `text/event-stream`
//! body into a stream of raw [`Frame`]s. Interpreting frames is left to
//! `roundtable-core`.

pub mod error;
pub mod frame;
pub mod transport;

pub use error::StreamError;
pub use frame::Frame;
pub use transport::{FrameSource, FrameStream, SseTransport};

/// Label the SSE protocol assigns to frames without an `event:` field
pub const DEFAULT_LABEL: &str = "message";
