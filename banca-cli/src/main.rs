mod commands;

use anyhow::Context;
use banca_core::{Backoffice, ServiceConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "banca")]
#[command(about = "Banca - lottery betting-pool back office")]
#[command(version)]
struct Cli {
    /// Data directory holding the database (ignored when BANCA_DATABASE_PATH is set)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and notification hub
    Serve {
        /// Bind address (overrides BANCA_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides BANCA_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Administrator account commands
    #[command(subcommand)]
    Admin(commands::AdminCommands),

    /// Zone management commands
    #[command(subcommand)]
    Zone(commands::ZoneCommands),

    /// Betting pool commands
    #[command(subcommand)]
    Pool(commands::PoolCommands),

    /// Sales reports
    #[command(subcommand)]
    Report(commands::ReportCommands),

    /// Terminal play notation
    #[command(subcommand)]
    Play(commands::PlayCommands),
}

fn load_config(data_dir: Option<PathBuf>) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::from_env()?;

    if std::env::var_os("BANCA_DATABASE_PATH").is_none() {
        let data_dir = data_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("banca")
        });
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
        config.database_path = data_dir.join("banca.db");
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "banca_core={0},banca_lottery={0},banca_api={0},banca={0},tower_http={0}",
                    log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        // Play expansion needs no database
        Commands::Play(cmd) => commands::handle_play_command(cmd),
        command => {
            let mut config = load_config(cli.data_dir)?;
            if let Commands::Serve { host, port } = &command {
                if let Some(host) = host {
                    config.host = host.clone();
                }
                if let Some(port) = port {
                    config.port = *port;
                }
            }
            let office = Arc::new(Backoffice::new(config).await?);
            run(command, office).await
        }
    }
}

async fn run(command: Commands, office: Arc<Backoffice>) -> anyhow::Result<()> {
    match command {
        Commands::Serve { .. } => banca_api::serve(office).await?,
        Commands::Admin(cmd) => commands::handle_admin_command(cmd, &office).await?,
        Commands::Zone(cmd) => commands::handle_zone_command(cmd, &office).await?,
        Commands::Pool(cmd) => commands::handle_pool_command(cmd, &office).await?,
        Commands::Report(cmd) => commands::handle_report_command(cmd, &office).await?,
        Commands::Play(cmd) => commands::handle_play_command(cmd)?,
    }

    Ok(())
}
