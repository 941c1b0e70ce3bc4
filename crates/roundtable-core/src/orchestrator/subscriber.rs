//! Live stream subscriber
//!
//! Owns the single connection slot. Opening always releases the previous
//! connection first, so two connections never overlap.

use std::sync::Arc;

use futures::StreamExt;
use roundtable_stream::Frame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ResearchApi;
use crate::types::SessionId;

/// What a reader task reports about its connection
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    Connected,
    Frame(Frame),
    /// Could not connect, or the connection broke
    Failed(String),
    /// The backend closed the stream normally
    Ended,
}

/// A signal tagged with the connection that produced it
#[derive(Debug)]
pub struct StreamMessage {
    pub connection: u64,
    pub signal: StreamSignal,
}

/// Handle to one live connection.
///
/// Dropping the handle cancels the reader; [`StreamHandle::release`] also
/// waits for it to finish.
#[derive(Debug)]
pub struct StreamHandle {
    connection: u64,
    session_id: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn connection(&self) -> u64 {
        self.connection
    }

    /// Cancel the reader and wait until the connection is gone
    pub async fn release(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                warn!("Stream reader for session {} panicked: {}", self.session_id, e);
            }
        }
        debug!("Released stream {} for session {}", self.connection, self.session_id);
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens and closes the live connection on behalf of the controller
pub struct StreamSubscriber {
    api: Arc<dyn ResearchApi>,
    signals: mpsc::UnboundedSender<StreamMessage>,
    current: Option<StreamHandle>,
}

impl StreamSubscriber {
    pub fn new(api: Arc<dyn ResearchApi>, signals: mpsc::UnboundedSender<StreamMessage>) -> Self {
        Self {
            api,
            signals,
            current: None,
        }
    }

    /// Release any held connection, then start one for `session_id`
    pub async fn open(&mut self, session_id: SessionId, connection: u64) {
        self.close_all().await;
        debug!("Opening stream {} for session {}", connection, session_id);
        self.current = Some(spawn_reader(
            self.api.clone(),
            session_id,
            connection,
            self.signals.clone(),
        ));
    }

    /// Release the connection if it is the one named
    pub async fn close(&mut self, connection: u64) {
        if self.current.as_ref().map(StreamHandle::connection) == Some(connection) {
            self.close_all().await;
        }
    }

    pub async fn close_all(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.release().await;
        }
    }
}

fn spawn_reader(
    api: Arc<dyn ResearchApi>,
    session_id: SessionId,
    connection: u64,
    signals: mpsc::UnboundedSender<StreamMessage>,
) -> StreamHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let id = session_id.clone();

    let task = tokio::spawn(async move {
        let send = |signal: StreamSignal| signals.send(StreamMessage { connection, signal }).is_ok();

        let opened = tokio::select! {
            _ = token.cancelled() => return,
            opened = api.open_stream(&id) => opened,
        };
        let mut frames = match opened {
            Ok(frames) => frames,
            Err(e) => {
                send(StreamSignal::Failed(e.to_string()));
                return;
            }
        };
        if !send(StreamSignal::Connected) {
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = frames.next() => {
                    let delivered = match item {
                        Some(Ok(frame)) => send(StreamSignal::Frame(frame)),
                        Some(Err(e)) => {
                            send(StreamSignal::Failed(e.to_string()));
                            break;
                        }
                        None => {
                            send(StreamSignal::Ended);
                            break;
                        }
                    };
                    if !delivered {
                        break;
                    }
                }
            }
        }
        // `frames` drops here, closing the HTTP connection
    });

    StreamHandle {
        connection,
        session_id,
        cancel,
        task,
    }
}
