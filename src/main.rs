use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atelier::config::AppConfig;
use atelier::server;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about = "AI ad-generation pipeline orchestrator")]
pub struct Cli {
    /// Path to a TOML configuration file (defaults to ./atelier.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the orchestration server
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Storage directory for uploads and artifacts (overrides config)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Maximum critique-driven retries per run (overrides config)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,

        /// Also write logs to daily-rotated files in this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// View or scaffold configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration after file and env overlays
    Show,
    /// Write a default atelier.toml to the current directory
    Init,
}

/// Install the global subscriber. Returns the appender guard, which must
/// stay alive for file logging to flush.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "atelier.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before config so env overlays see its values.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            port,
            storage_dir,
            max_retries,
            dev,
            log_dir,
        } => {
            let _guard = init_tracing(log_dir.as_ref());
            let mut config = AppConfig::load(cli.config.as_deref())?;
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(dir) = storage_dir {
                config.server.storage_dir = dir.clone();
            }
            if let Some(n) = max_retries {
                config.pipeline.max_retries = *n;
            }
            if *dev {
                config.server.dev = true;
            }
            server::start_server(config).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = AppConfig::load(cli.config.as_deref())?;
                print!("{}", config.to_toml_string()?);
            }
            ConfigCommands::Init => {
                let path = PathBuf::from("atelier.toml");
                if path.exists() {
                    anyhow::bail!("atelier.toml already exists");
                }
                let defaults = AppConfig::default().to_toml_string()?;
                std::fs::write(&path, defaults)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote default configuration to {}", path.display());
            }
        },
    }

    Ok(())
}
