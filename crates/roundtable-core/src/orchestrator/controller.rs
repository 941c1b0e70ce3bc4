//! Orchestrator actor
//!
//! A single task owns the [`OrchestratorState`]. Frontends talk to it via an
//! [`OrchestratorHandle`]; network calls run in spawned tasks whose results
//! come back through the actor's inbox, so the state is only ever touched by
//! one message at a time.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use super::gate::FeedbackAction;
use super::state::{Effect, LoadCause, OrchestratorState};
use super::subscriber::{StreamMessage, StreamSubscriber};
use super::types::{OrchestratorOutput, Snapshot};
use crate::api::ResearchApi;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::types::{CreateSessionRequest, FeedbackAck, Report, Session, SessionId};

/// Receiver for orchestrator updates
pub type OutputReceiver = broadcast::Receiver<OrchestratorOutput>;

const COMMAND_CAPACITY: usize = 64;

/// Requests from frontends
enum Command {
    Refresh {
        reply: oneshot::Sender<Result<()>>,
    },
    Select {
        id: Option<SessionId>,
        reply: oneshot::Sender<()>,
    },
    Create {
        topic: String,
        max_analysts: u32,
        reply: oneshot::Sender<Result<Session>>,
    },
    Remove {
        id: SessionId,
        reply: oneshot::Sender<Result<()>>,
    },
    Feedback {
        id: SessionId,
        action: Result<FeedbackAction>,
        reply: oneshot::Sender<Result<FeedbackAck>>,
    },
    Reconnect {
        reply: oneshot::Sender<Result<()>>,
    },
    Dismiss {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of spawned network calls
enum Completion {
    Sessions {
        result: Result<Vec<Session>>,
        reply: oneshot::Sender<Result<()>>,
    },
    Detail {
        id: SessionId,
        epoch: u64,
        request: u64,
        cause: LoadCause,
        result: Result<Session>,
    },
    Report {
        id: SessionId,
        epoch: u64,
        result: Result<Option<Report>>,
    },
    Created {
        result: Result<Session>,
        reply: oneshot::Sender<Result<Session>>,
    },
    Removed {
        id: SessionId,
        result: Result<()>,
        reply: oneshot::Sender<Result<()>>,
    },
    Feedback {
        id: SessionId,
        epoch: u64,
        text: String,
        result: Result<FeedbackAck>,
        reply: oneshot::Sender<Result<FeedbackAck>>,
    },
}

/// Owns orchestration state and executes its effects
pub struct Orchestrator {
    api: Arc<dyn ResearchApi>,
    state: OrchestratorState,
    subscriber: StreamSubscriber,
    commands: mpsc::Receiver<Command>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    signal_rx: mpsc::UnboundedReceiver<StreamMessage>,
    output_tx: broadcast::Sender<OrchestratorOutput>,
}

impl Orchestrator {
    /// Create the actor and a handle to it. Call [`Orchestrator::run`] to start it.
    pub fn new(api: Arc<dyn ResearchApi>, config: &StreamConfig) -> (Self, OrchestratorHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (output_tx, _) = broadcast::channel(config.output_capacity.max(1));

        let orchestrator = Self {
            api: api.clone(),
            state: OrchestratorState::new(config.notification_limit),
            subscriber: StreamSubscriber::new(api, signal_tx),
            commands,
            completion_tx,
            completion_rx,
            signal_rx,
            output_tx: output_tx.clone(),
        };
        let handle = OrchestratorHandle {
            commands: command_tx,
            output_tx,
        };

        (orchestrator, handle)
    }

    /// Create the actor and run it on a new task
    pub fn spawn(api: Arc<dyn ResearchApi>, config: &StreamConfig) -> OrchestratorHandle {
        let (orchestrator, handle) = Self::new(api, config);
        tokio::spawn(orchestrator.run());
        handle
    }

    /// Process messages until shut down or every handle is dropped
    pub async fn run(mut self) {
        info!("Orchestrator started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion).await;
                }
                Some(message) = self.signal_rx.recv() => {
                    let effects = self.state.stream_signal(message.connection, message.signal, Utc::now());
                    self.execute(effects).await;
                }
            }
        }
        info!("Orchestrator stopped");
    }

    async fn stop(&mut self) {
        let effects = self.state.shutdown();
        self.execute(effects).await;
        self.subscriber.close_all().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh { reply } => {
                let api = self.api.clone();
                self.spawn_call(async move { api.list_sessions().await }, move |result| {
                    Completion::Sessions { result, reply }
                });
            }
            Command::Select { id, reply } => {
                let effects = self.state.select(id);
                self.execute(effects).await;
                let _ = reply.send(());
            }
            Command::Create {
                topic,
                max_analysts,
                reply,
            } => match CreateSessionRequest::new(&topic, max_analysts) {
                Ok(request) => {
                    let api = self.api.clone();
                    self.spawn_call(
                        async move { api.create_session(&request).await },
                        move |result| Completion::Created { result, reply },
                    );
                }
                Err(e) => {
                    let effects = self.state.create_failed(&e);
                    self.execute(effects).await;
                    let _ = reply.send(Err(e));
                }
            },
            Command::Remove { id, reply } => {
                if let Err(e) = self.state.removal_target(&id) {
                    let _ = reply.send(Err(e));
                    return;
                }
                let api = self.api.clone();
                let target = id.clone();
                self.spawn_call(
                    async move { api.delete_session(&target).await },
                    move |result| Completion::Removed { id, result, reply },
                );
            }
            Command::Feedback { id, action, reply } => {
                let checked = action.and_then(|action| {
                    let epoch = self.state.begin_feedback(&id, &action)?;
                    Ok((epoch, action))
                });
                match checked {
                    Ok((epoch, action)) => {
                        let api = self.api.clone();
                        let text = action.wire_text().to_string();
                        let target = id.clone();
                        let sent = text.clone();
                        self.spawn_call(
                            async move { api.submit_feedback(&target, &sent).await },
                            move |result| Completion::Feedback {
                                id,
                                epoch,
                                text,
                                result,
                                reply,
                            },
                        );
                    }
                    Err(e) => {
                        let effects = self.state.feedback_rejected(&e);
                        self.execute(effects).await;
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::Reconnect { reply } => match self.state.reconnect() {
                Ok(effects) => {
                    self.execute(effects).await;
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Dismiss { id, reply } => {
                let _ = reply.send(self.state.dismiss(id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            // Handled by the run loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Sessions { result, reply } => {
                let (effects, outcome) = match result {
                    Ok(sessions) => (self.state.sessions_loaded(sessions), Ok(())),
                    Err(e) => (self.state.sessions_failed(&e), Err(e)),
                };
                self.execute(effects).await;
                let _ = reply.send(outcome);
            }
            Completion::Detail {
                id,
                epoch,
                request,
                cause,
                result,
            } => {
                let effects = match result {
                    Ok(session) => self.state.detail_loaded(&id, epoch, request, cause, session),
                    Err(e) => self.state.detail_failed(&id, epoch, request, &e),
                };
                self.execute(effects).await;
            }
            Completion::Report { id, epoch, result } => {
                let effects = match result {
                    Ok(report) => self.state.report_loaded(&id, epoch, report),
                    Err(e) => self.state.report_failed(&id, epoch, &e),
                };
                self.execute(effects).await;
            }
            Completion::Created { result, reply } => match result {
                Ok(session) => {
                    let effects = self.state.session_created(session.clone());
                    self.execute(effects).await;
                    let _ = reply.send(Ok(session));
                }
                Err(e) => {
                    let effects = self.state.create_failed(&e);
                    self.execute(effects).await;
                    let _ = reply.send(Err(e));
                }
            },
            Completion::Removed { id, result, reply } => {
                let (effects, outcome) = match result {
                    Ok(()) => (self.state.session_removed(&id), Ok(())),
                    Err(e) => (self.state.remove_failed(&e), Err(e)),
                };
                self.execute(effects).await;
                let _ = reply.send(outcome);
            }
            Completion::Feedback {
                id,
                epoch,
                text,
                result,
                reply,
            } => {
                let (effects, outcome) = match result {
                    Ok(ack) => (self.state.feedback_submitted(&id, epoch, text), Ok(ack)),
                    Err(e) => (self.state.feedback_failed(epoch, &e), Err(e)),
                };
                self.execute(effects).await;
                let _ = reply.send(outcome);
            }
        }
    }

    /// Carry out effects in order
    async fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadDetail {
                    id,
                    epoch,
                    request,
                    cause,
                } => {
                    debug!("Loading detail for session {} ({:?})", id, cause);
                    let api = self.api.clone();
                    let target = id.clone();
                    self.spawn_call(async move { api.get_session(&target).await }, move |result| {
                        Completion::Detail {
                            id,
                            epoch,
                            request,
                            cause,
                            result,
                        }
                    });
                }
                Effect::LoadReport { id, epoch, cause } => {
                    debug!("Loading report for session {} ({:?})", id, cause);
                    let api = self.api.clone();
                    let target = id.clone();
                    self.spawn_call(async move { api.get_report(&target).await }, move |result| {
                        Completion::Report { id, epoch, result }
                    });
                }
                Effect::OpenStream { id, connection } => {
                    self.subscriber.open(id, connection).await;
                }
                Effect::CloseStream { connection } => {
                    self.subscriber.close(connection).await;
                }
                Effect::Emit(output) => {
                    // No subscribers is fine
                    let _ = self.output_tx.send(output);
                }
            }
        }
    }

    fn spawn_call<F, T, W>(&self, call: F, wrap: W)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        W: FnOnce(T) -> Completion + Send + 'static,
    {
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = call.await;
            let _ = tx.send(wrap(result));
        });
    }
}

/// Cloneable handle for driving an [`Orchestrator`]
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    output_tx: broadcast::Sender<OrchestratorOutput>,
}

impl OrchestratorHandle {
    /// Receive every update published from now on
    pub fn subscribe(&self) -> OutputReceiver {
        self.output_tx.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::Shutdown)?;
        rx.await.map_err(|_| Error::Shutdown)
    }

    /// Reload the session list
    pub async fn refresh(&self) -> Result<()> {
        self.request(|reply| Command::Refresh { reply }).await?
    }

    /// Select a session, or clear the selection with `None`
    pub async fn select(&self, id: Option<SessionId>) -> Result<()> {
        self.request(|reply| Command::Select { id, reply }).await
    }

    /// Start a research run and select it
    pub async fn create(&self, topic: impl Into<String>, max_analysts: u32) -> Result<Session> {
        let topic = topic.into();
        self.request(|reply| Command::Create {
            topic,
            max_analysts,
            reply,
        })
        .await?
    }

    /// Delete a session once `confirm` agrees. Returns false if it declined.
    pub async fn remove<F>(&self, id: &SessionId, confirm: F) -> Result<bool>
    where
        F: FnOnce(&Session) -> bool,
    {
        let snapshot = self.snapshot().await?;
        let session = snapshot
            .sessions
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::NotFound(format!("Session {} is not in the list", id)))?;
        if !confirm(session) {
            debug!("Delete of session {} declined", id);
            return Ok(false);
        }

        let id = id.clone();
        self.request(|reply| Command::Remove { id, reply }).await??;
        Ok(true)
    }

    pub async fn submit_feedback(
        &self,
        id: &SessionId,
        action: FeedbackAction,
    ) -> Result<FeedbackAck> {
        self.send_feedback(id, Ok(action)).await
    }

    /// Accept the generated analysts
    pub async fn approve(&self, id: &SessionId) -> Result<FeedbackAck> {
        self.send_feedback(id, Ok(FeedbackAction::Approve)).await
    }

    /// Ask for a different analyst team
    pub async fn revise(&self, id: &SessionId, text: impl Into<String>) -> Result<FeedbackAck> {
        self.send_feedback(id, FeedbackAction::revise(text)).await
    }

    async fn send_feedback(
        &self,
        id: &SessionId,
        action: Result<FeedbackAction>,
    ) -> Result<FeedbackAck> {
        let id = id.clone();
        self.request(|reply| Command::Feedback { id, action, reply })
            .await?
    }

    /// Reopen the live stream of the selected session after it closed
    pub async fn reconnect(&self) -> Result<()> {
        self.request(|reply| Command::Reconnect { reply }).await?
    }

    /// Dismiss a notification; returns false if it was already gone
    pub async fn dismiss(&self, id: Uuid) -> Result<bool> {
        self.request(|reply| Command::Dismiss { id, reply }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Close the stream and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
