//! Command-line interface: clap types and command dispatch.

use crate::app::{shutdown_signal, App, RunMode};
use crate::config::{ConfigLoader, SitegenConfig};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::provider::BackendFactory;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Sitegen - prompt in, HTML page out, via a durable work queue
#[derive(Parser)]
#[command(name = "sitegen")]
#[command(about = "Asynchronous site generation: submit a prompt, poll for the page")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (default: ./sitegen.toml when present)
    #[arg(long, env = "SITEGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API only
    Serve,
    /// Run the worker pool only
    Work,
    /// Run the HTTP API and the worker pool in one process
    Run,
    /// Load and validate configuration, then print a summary
    CheckConfig,
}

impl Commands {
    fn run_mode(&self) -> Option<RunMode> {
        match self {
            Commands::Serve => Some(RunMode::Serve),
            Commands::Work => Some(RunMode::Work),
            Commands::Run => Some(RunMode::All),
            Commands::CheckConfig => None,
        }
    }
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
pub fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = ConfigLoader::load(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }

    config
}

/// Execute the parsed command. Long-running modes return after shutdown.
pub async fn execute(cli: &Cli) -> Result<String, ApiError> {
    let config = ConfigLoader::load_validated(cli.config.as_deref())?;

    match cli.command.run_mode() {
        Some(mode) => {
            info!(mode = ?mode, bind = %config.server.bind, "Sitegen starting");
            let app = App::from_config(config)?;
            app.run(mode, shutdown_signal()).await?;
            Ok("Sitegen stopped".to_string())
        }
        None => Ok(summarize(&config)),
    }
}

fn summarize(config: &SitegenConfig) -> String {
    let backend = match BackendFactory::create_backend(&config.backend) {
        Ok(backend) => format!("{} ({})", backend.backend_name(), backend.model_name()),
        Err(e) => format!("not ready: {}", e),
    };
    let queue = match config.queue.kind {
        crate::config::QueueKind::Memory => "memory".to_string(),
        crate::config::QueueKind::Sled => format!("sled at {}", config.queue.path.display()),
    };
    let store = match config.store.kind {
        crate::config::StoreKind::Memory => "memory".to_string(),
        crate::config::StoreKind::Filesystem => {
            format!("filesystem at {}", config.store.root.display())
        }
    };

    [
        "Configuration OK".to_string(),
        format!("  bind:        {}", config.server.bind),
        format!("  queue:       {}", queue),
        format!(
            "  visibility:  {}s, max receives {}",
            config.queue.visibility_timeout_secs,
            config
                .queue
                .max_receive_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        ),
        format!("  store:       {}", store),
        format!("  backend:     {}", backend),
        format!(
            "  workers:     {} (backend timeout {}s)",
            config.worker.concurrency, config.worker.backend_timeout_secs
        ),
        format!("  status:      {:?}", config.status.mode),
    ]
    .join("\n")
}
