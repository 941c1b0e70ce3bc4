//! Live session follower with interactive analyst review

use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use roundtable_core::{
    CloseReason, EventKind, FeedbackAction, FeedbackGate, OrchestratorOutput, SessionEvent,
    SessionId, SessionStatus, Snapshot, event_line, status_label, truncate_str,
};

use crate::commands::{App, save_report};

/// What the user decided about a proposed analyst team
enum Review {
    Decided(FeedbackAction),
    Later,
}

/// Follow a session until its report is saved, it fails, or the stream stops
pub async fn follow(app: &App, id: &SessionId) -> Result<()> {
    let handle = &app.handle;
    let mut updates = handle.subscribe();
    handle.select(Some(id.clone())).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.blue} {msg}")?);
    spinner.set_message("Connecting to live updates...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut printer = EventPrinter::new(app.json);
    let mut review_deferred = false;
    let mut closed: Option<CloseReason> = None;
    let mut draining = false;

    loop {
        let snapshot = handle.snapshot().await?;
        for event in &snapshot.events {
            printer.print(&spinner, event);
        }

        if let Some(report) = &snapshot.report {
            spinner.finish_and_clear();
            let path = save_report(report, None)?;
            println!(
                "{} Report saved to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
            return Ok(());
        }

        if snapshot.status() == Some(SessionStatus::Failed) {
            spinner.finish_and_clear();
            bail!("Research session {} failed", id);
        }

        match &snapshot.gate {
            Some(gate) if !review_deferred => {
                let review =
                    tokio::task::block_in_place(|| spinner.suspend(|| prompt_review(gate)))?;
                match review {
                    Review::Decided(action) => {
                        // Rejections also arrive as error notifications
                        match handle.submit_feedback(id, action).await {
                            Err(e) if !e.is_recoverable() => return Err(e.into()),
                            Err(e) => debug!("Feedback for session {} not accepted: {}", id, e),
                            Ok(_) => {}
                        }
                    }
                    Review::Later => {
                        review_deferred = true;
                        spinner.println(
                            style(format!(
                                "Review later with: roundtable approve {} or roundtable revise {} \"...\"",
                                id, id
                            ))
                            .dim()
                            .to_string(),
                        );
                    }
                }
                continue;
            }
            None => review_deferred = false,
            _ => {}
        }

        if let Some(reason) = closed.take() {
            match reason {
                CloseReason::Ended if awaiting_report(&snapshot) => draining = true,
                CloseReason::Ended => {
                    spinner.finish_and_clear();
                    println!("{}", style("Live updates ended").dim());
                    return Ok(());
                }
                CloseReason::ServerError(message) | CloseReason::Failed(message) => {
                    let retry = tokio::task::block_in_place(|| {
                        spinner.suspend(|| {
                            eprintln!("{}", style(format!("Stream closed: {}", message)).red());
                            Confirm::with_theme(&ColorfulTheme::default())
                                .with_prompt("Reconnect?")
                                .default(true)
                                .interact()
                        })
                    })?;
                    if !retry {
                        spinner.finish_and_clear();
                        return Ok(());
                    }
                    spinner.set_message("Reconnecting...");
                    handle.reconnect().await?;
                    continue;
                }
                CloseReason::SelectionChanged | CloseReason::Shutdown => {
                    spinner.finish_and_clear();
                    return Ok(());
                }
            }
        }

        let update = if draining {
            match tokio::time::timeout(app.timeout, updates.recv()).await {
                Ok(update) => update,
                Err(_) => {
                    spinner.finish_and_clear();
                    bail!("Live updates ended before the report arrived");
                }
            }
        } else {
            updates.recv().await
        };

        match update {
            Ok(OrchestratorOutput::StreamOpened { .. }) => {
                spinner.set_message("Waiting for events...");
            }
            Ok(OrchestratorOutput::StreamClosed { session_id, reason }) if &session_id == id => {
                closed = Some(reason);
            }
            Ok(OrchestratorOutput::DetailChanged { session, .. }) if &session.id == id => {
                spinner.set_message(format!("Status: {}", status_label(session.status)));
            }
            Ok(OrchestratorOutput::Notification { notification }) if notification.is_error() => {
                spinner.println(style(&notification.message).red().to_string());
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Skipped {} orchestrator updates", skipped),
            Err(RecvError::Closed) => bail!("Orchestrator stopped"),
        }
    }
}

/// The stream finished but a completed session's report is still on its way
fn awaiting_report(snapshot: &Snapshot) -> bool {
    let completed = snapshot.status().is_some_and(|s| s.is_complete());
    snapshot.report.is_none()
        && (completed || snapshot.events.iter().any(|e| e.kind == EventKind::ReportReady))
}

/// Prints each event once, however often it is seen in snapshots
struct EventPrinter {
    json: bool,
    next_seq: u64,
}

impl EventPrinter {
    fn new(json: bool) -> Self {
        Self { json, next_seq: 0 }
    }

    fn print(&mut self, spinner: &ProgressBar, event: &SessionEvent) {
        if event.seq < self.next_seq {
            return;
        }
        self.next_seq = event.seq + 1;

        let line = if self.json {
            serde_json::to_string(event).unwrap_or_else(|_| event_line(event))
        } else {
            event_line(event)
        };
        spinner.println(line);
    }
}

fn prompt_review(gate: &FeedbackGate) -> Result<Review> {
    println!();
    println!("{}", style("Proposed analysts:").bold());
    for analyst in &gate.analysts {
        println!(
            "  {} {} - {}",
            style("•").dim(),
            style(&analyst.name).green(),
            analyst.role
        );
        if !analyst.description.is_empty() {
            println!("    {}", style(truncate_str(&analyst.description, 100)).dim());
        }
    }
    println!();

    let items = ["Approve these analysts", "Ask for changes", "Decide later"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Review the analyst team")
        .items(&items[..])
        .default(0)
        .interact()?;

    match choice {
        0 => Ok(Review::Decided(FeedbackAction::Approve)),
        1 => {
            let text = Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("What should change?")
                .validate_with(|input: &String| -> Result<(), String> {
                    FeedbackAction::revise(input.as_str())
                        .map(|_| ())
                        .map_err(|e| e.user_message())
                })
                .interact_text()?;
            Ok(Review::Decided(FeedbackAction::revise(text)?))
        }
        _ => Ok(Review::Later),
    }
}
