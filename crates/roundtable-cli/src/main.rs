//! Roundtable CLI - start, follow and review research sessions

mod commands;
mod watch;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roundtable_core::ConfigManager;

#[derive(Parser)]
#[command(name = "roundtable")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run multi-analyst research sessions from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Research backend URL (overrides the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List research sessions, newest first
    List,

    /// Start a new research session
    New {
        /// Research topic
        topic: String,

        /// Number of analysts to generate (1-5)
        #[arg(short = 'n', long)]
        analysts: Option<u32>,

        /// Follow the session after starting it
        #[arg(short, long)]
        watch: bool,
    },

    /// Show a session with its analysts
    Show {
        /// Session id
        id: String,
    },

    /// Follow a session live, reviewing analysts when asked
    Watch {
        /// Session id
        id: String,
    },

    /// Approve the proposed analysts
    Approve {
        /// Session id
        id: String,
    },

    /// Ask for a different set of analysts
    Revise {
        /// Session id
        id: String,

        /// What to change about the analysts
        feedback: String,
    },

    /// Save the final report as Markdown
    Report {
        /// Session id
        id: String,

        /// Output file (defaults to report-<id>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show configuration and check the backend
    Config {
        /// Store a new backend URL in the config file
        #[arg(long)]
        set_server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut manager = ConfigManager::new()?;

    // general.log_level sets the base level once --verbose is given
    let default_filter = if cli.verbose {
        format!(
            "{},roundtable_core=debug,roundtable_stream=debug",
            manager.config().general.log_level
        )
    } else {
        "warn".to_string()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(server) = &cli.server {
        manager.set_base_url(server)?;
    }

    let command = match cli.command {
        Commands::Config { set_server } => {
            return commands::show_config(&mut manager, set_server, cli.json).await;
        }
        command => command,
    };

    let app = commands::App::connect(manager.config(), cli.json)?;
    let result = match command {
        Commands::List => app.list().await,
        Commands::New {
            topic,
            analysts,
            watch,
        } => app.create(&topic, analysts, watch).await,
        Commands::Show { id } => app.show(&id).await,
        Commands::Watch { id } => app.watch(&id).await,
        Commands::Approve { id } => app.approve(&id).await,
        Commands::Revise { id, feedback } => app.revise(&id, &feedback).await,
        Commands::Report { id, output } => app.report(&id, output).await,
        Commands::Delete { id, yes } => app.delete(&id, yes).await,
        Commands::Config { .. } => Ok(()),
    };

    app.shutdown().await;
    result
}
