//! Keepsake CLI - ks command

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::cmd::{self, Target};
use journal::SessionEvent;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keepsake - checkpoint history for agent sessions
#[derive(Parser)]
#[command(name = "ks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session to operate on
    #[arg(short, long, global = true, env = "KEEPSAKE_SESSION", default_value = "default")]
    session: String,

    /// Project directory (default: discovered from the current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Keepsake in the current (or given) directory
    Init,
    /// Show checkpoint settings and count
    Settings {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change checkpoint settings
    Set {
        /// Enable or disable automatic checkpoints
        #[arg(long)]
        enabled: Option<bool>,
        /// Strategy: manual, per_prompt, per_tool_use or smart
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Delete all but the most recent checkpoints
    Cleanup {
        /// Checkpoints to keep (default: engine.auto_cleanup_keep)
        #[arg(short, long, allow_negative_numbers = true)]
        keep: Option<i64>,
    },
    /// Print the number of checkpoints
    Count,
    /// Show checkpoint timeline
    Log {
        /// Number of checkpoints to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
        /// Show local timestamps instead of relative times
        #[arg(long)]
        absolute: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a session event
    #[command(subcommand)]
    Record(RecordCommands),
    /// Delete the session with all its checkpoints and settings
    Forget {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Answer JSON requests read line by line from stdin
    Api,
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum RecordCommands {
    /// A prompt was submitted
    Prompt {
        /// File holding the session state to snapshot
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// A tool was invoked
    Tool {
        /// Tool name
        name: String,
        /// The tool changes files or other state
        #[arg(long)]
        mutating: bool,
        /// File holding the session state to snapshot
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Explicit checkpoint request
    Manual {
        /// File holding the session state to snapshot
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all values
    List,
    /// Print one value
    Get {
        /// Dotted key, e.g. engine.auto_cleanup_keep
        key: String,
    },
    /// Change one value
    Set { key: String, value: String },
    /// Show the config file location
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an annotated example file
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KEEPSAKE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let target = Target {
        project_dir: cli.project.clone(),
        session: cli.session,
    };

    match cli.command {
        Commands::Init => cmd::init::run(cli.project).await,
        Commands::Settings { json } => cmd::settings::run(&target, json).await,
        Commands::Set { enabled, strategy } => cmd::set::run(&target, enabled, strategy).await,
        Commands::Cleanup { keep } => cmd::cleanup::run(&target, keep).await,
        Commands::Count => cmd::count::run(&target).await,
        Commands::Log {
            limit,
            absolute,
            json,
        } => cmd::log::run(&target, limit, absolute, json).await,
        Commands::Record(record) => {
            let (event, state) = match record {
                RecordCommands::Prompt { state } => (SessionEvent::PromptSubmitted, state),
                RecordCommands::Tool {
                    name,
                    mutating,
                    state,
                } => (SessionEvent::tool(name, mutating), state),
                RecordCommands::Manual { state } => (SessionEvent::ManualRequest, state),
            };
            cmd::record::run(&target, event, state.as_deref()).await
        }
        Commands::Forget { yes } => cmd::forget::run(&target, yes).await,
        Commands::Api => cmd::api::run(&target).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
