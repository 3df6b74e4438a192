use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use logger::LogFormat;
use pulsewatch::{Config, Orchestrator};
use tracing::{info, level_filters::LevelFilter, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Uptime checks with SMS alerts on state changes")]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/pulsewatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_ref()).context("Failed to load configuration")?;

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let level = config.logging.level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let format = config.logging.format.parse::<LogFormat>().unwrap_or_default();
    logger::init_with(level, format);

    let mut orchestrator = Orchestrator::new(config)?;

    if cli.once {
        let summary = orchestrator.poll_once().await;
        info!(
            evaluated = summary.evaluated,
            alerts = summary.alerts,
            rejected = summary.rejected,
            unreadable = summary.unreadable,
            "Poll cycle finished"
        );
        return Ok(());
    }

    orchestrator.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    orchestrator.shutdown();

    Ok(())
}
