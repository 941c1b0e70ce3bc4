//! One-shot subcommands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use roundtable_core::{
    Config, ConfigManager, FeedbackGate, GeneralConfig, HttpClient, Orchestrator,
    OrchestratorHandle, OrchestratorOutput, OutputReceiver, Report, ResearchApi, Session,
    SessionId, Snapshot, report_file_name, report_markdown, short_date, status_label,
    truncate_str,
};

use crate::watch;

/// A connected orchestrator plus the settings the commands need
pub struct App {
    pub handle: OrchestratorHandle,
    pub api: Arc<dyn ResearchApi>,
    pub general: GeneralConfig,
    pub timeout: Duration,
    pub json: bool,
}

impl App {
    pub fn connect(config: &Config, json: bool) -> Result<Self> {
        let api: Arc<dyn ResearchApi> = Arc::new(HttpClient::new(&config.server)?);
        let handle = Orchestrator::spawn(api.clone(), &config.stream);
        Ok(Self {
            handle,
            api,
            general: config.general.clone(),
            timeout: config.server.request_timeout(),
            json,
        })
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.handle.shutdown().await {
            debug!("Orchestrator already stopped: {}", e);
        }
    }

    pub async fn list(&self) -> Result<()> {
        self.handle.refresh().await?;
        let snapshot = self.handle.snapshot().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot.sessions)?);
            return Ok(());
        }

        if snapshot.sessions.is_empty() {
            println!("{}", style("No research sessions yet").dim());
            return Ok(());
        }

        println!("{}", style("Research Sessions:").bold());
        for session in &snapshot.sessions {
            println!(
                "  {:>6}  {:<9} {:<7} {}",
                style(session.id.as_str()).cyan(),
                styled_status(session),
                style(short_date(session.created_at)).dim(),
                truncate_str(&session.topic, 60)
            );
        }
        Ok(())
    }

    pub async fn create(&self, topic: &str, analysts: Option<u32>, follow: bool) -> Result<()> {
        let analysts = analysts.unwrap_or(self.general.default_analysts);
        let session = self.handle.create(topic, analysts).await?;

        if self.json && !follow {
            println!("{}", serde_json::to_string_pretty(&session)?);
            return Ok(());
        }

        println!(
            "{} Research started: session {} ({} analysts)",
            style("✓").green(),
            style(session.id.as_str()).cyan(),
            session.max_analysts
        );

        if follow {
            watch::follow(self, &session.id).await
        } else {
            println!(
                "  {}",
                style(format!("Follow it with: roundtable watch {}", session.id)).dim()
            );
            Ok(())
        }
    }

    pub async fn show(&self, id: &str) -> Result<()> {
        let snapshot = self.open(&SessionId::new(id)).await?;
        let Some(session) = &snapshot.detail else {
            bail!("Session {} has no detail", id);
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(session)?);
            return Ok(());
        }

        println!("{}", style(&session.topic).bold());
        println!("  Session:  {}", style(session.id.as_str()).cyan());
        println!("  Status:   {}", styled_status(session));
        println!("  Created:  {}", short_date(session.created_at));
        println!("  Analysts: {} requested", session.max_analysts);
        if let Some(feedback) = &session.human_analyst_feedback {
            println!("  Feedback: {}", style(feedback).dim());
        }

        if session.has_analysts() {
            println!();
            println!("{}", style("Analysts:").bold());
            for analyst in &session.analysts {
                println!(
                    "  {} {} - {}",
                    style("•").dim(),
                    style(&analyst.name).green(),
                    analyst.role
                );
                if !analyst.affiliation.is_empty() {
                    println!("    {}", style(&analyst.affiliation).dim());
                }
                if !analyst.description.is_empty() {
                    println!("    {}", truncate_str(&analyst.description, 100));
                }
            }
        }

        println!();
        if snapshot.gate_open() {
            println!(
                "{}",
                style(format!(
                    "Waiting for review: roundtable approve {} or roundtable revise {} \"...\"",
                    id, id
                ))
                .yellow()
            );
        } else if session.status.is_complete() {
            println!(
                "{}",
                style(format!("Report ready: roundtable report {}", id)).green()
            );
        }
        Ok(())
    }

    pub async fn watch(&self, id: &str) -> Result<()> {
        watch::follow(self, &SessionId::new(id)).await
    }

    pub async fn approve(&self, id: &str) -> Result<()> {
        let id = SessionId::new(id);
        self.open(&id).await?;
        let ack = self.handle.approve(&id).await?;
        println!("{} {}", style("✓").green(), ack.message);
        Ok(())
    }

    pub async fn revise(&self, id: &str, feedback: &str) -> Result<()> {
        let id = SessionId::new(id);
        self.open(&id).await?;
        let ack = self.handle.revise(&id, feedback).await?;
        println!("{} {}", style("✓").green(), ack.message);
        println!(
            "  {}",
            style(format!("New analysts will follow: roundtable watch {}", id)).dim()
        );
        Ok(())
    }

    pub async fn report(&self, id: &str, output: Option<PathBuf>) -> Result<()> {
        let id = SessionId::new(id);
        let Some(report) = self.api.get_report(&id).await? else {
            bail!("Report for session {} is not available yet", id);
        };
        let path = save_report(&report, output)?;
        println!(
            "{} Report saved to {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        Ok(())
    }

    pub async fn delete(&self, id: &str, yes: bool) -> Result<()> {
        self.handle.refresh().await?;
        let ask = !yes && self.general.confirm_deletes;

        let deleted = self
            .handle
            .remove(&SessionId::new(id), |session| {
                !ask || tokio::task::block_in_place(|| confirm_delete(session))
            })
            .await?;

        if deleted {
            println!("{} Session {} deleted", style("✓").green(), id);
        } else {
            println!("{}", style("Cancelled").dim());
        }
        Ok(())
    }

    /// Select a session and wait until its detail is loaded
    pub async fn open(&self, id: &SessionId) -> Result<Snapshot> {
        let mut updates = self.handle.subscribe();
        self.handle.select(Some(id.clone())).await?;

        let snapshot = self.handle.snapshot().await?;
        if !has_detail(&snapshot, id) {
            tokio::time::timeout(self.timeout, self.wait_for_detail(&mut updates, id))
                .await
                .with_context(|| format!("Timed out loading session {}", id))??;
        }
        Ok(self.handle.snapshot().await?)
    }

    async fn wait_for_detail(&self, updates: &mut OutputReceiver, id: &SessionId) -> Result<()> {
        loop {
            match updates.recv().await {
                Ok(OrchestratorOutput::DetailChanged { session, .. }) if &session.id == id => {
                    return Ok(());
                }
                Ok(OrchestratorOutput::DetailFailed {
                    session_id,
                    message,
                }) if &session_id == id => {
                    bail!("{}", message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} orchestrator updates", skipped);
                    if has_detail(&self.handle.snapshot().await?, id) {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => bail!("Orchestrator stopped"),
            }
        }
    }
}

fn has_detail(snapshot: &Snapshot, id: &SessionId) -> bool {
    snapshot.detail.as_ref().is_some_and(|s| &s.id == id)
}

/// Write a report as Markdown, to `report-<id>.md` unless a path is given
pub fn save_report(report: &Report, output: Option<PathBuf>) -> Result<PathBuf> {
    let path = output.unwrap_or_else(|| PathBuf::from(report_file_name(&report.session_id)));
    std::fs::write(&path, report_markdown(report))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn styled_status(session: &Session) -> console::StyledObject<&'static str> {
    let label = status_label(session.status);
    if session.status.is_complete() {
        style(label).green()
    } else if session.status.is_terminal() {
        style(label).red()
    } else if FeedbackGate::is_open(session) {
        style(label).yellow()
    } else {
        style(label).cyan()
    }
}

fn confirm_delete(session: &Session) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Delete session {} ({})?",
            session.id,
            truncate_str(&session.topic, 40)
        ))
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Print the effective configuration and check the backend
pub async fn show_config(
    manager: &mut ConfigManager,
    set_server: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(server) = set_server {
        manager.set_base_url(server)?;
        manager.save()?;
        println!(
            "{} Saved backend URL to {}",
            style("✓").green(),
            manager.config_path().display()
        );
    }

    let config = manager.config();
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", style("Configuration:").bold());
        println!(
            "  Config file: {}",
            style(manager.config_path().display()).green()
        );
        println!();
        println!("{}", toml::to_string_pretty(config)?);
    }

    let client = HttpClient::new(&config.server)?;
    match client.health().await {
        Ok(health) => println!(
            "{} Backend reachable at {} ({})",
            style("✓").green(),
            client.base_url(),
            health.service.as_deref().unwrap_or(&health.status)
        ),
        Err(e) => println!(
            "{} Backend unreachable at {}: {}",
            style("✗").red(),
            client.base_url(),
            e.user_message()
        ),
    }
    Ok(())
}
