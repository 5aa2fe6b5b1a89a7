//! tapguard operator CLI
//!
//! Loads a deployment configuration and drives the attendance pipeline against the
//! configured JSON-lines log: validate configuration, submit a tap, inspect a tag's history,
//! or rebuild every tag's high-water mark.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tapguard_core::TapGuardConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{history, rebuild, tap, HistoryArgs, TapArgs};

#[derive(Parser)]
#[command(name = "tapguard")]
#[command(about = "tapguard - replay-safe NFC tap attendance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "tapguard.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print a redacted summary
    CheckConfig,

    /// Authenticate one tap against the attendance log
    Tap(TapArgs),

    /// List a tag's attendance records ordered by counter
    History(HistoryArgs),

    /// Rescan the attendance log and print every tag's high-water mark
    Rebuild,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = TapGuardConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::CheckConfig => commands::check_config(&config, &mut out)?,
        Commands::Tap(args) => tap(&config, &args, &mut out).await?,
        Commands::History(args) => history(&config, &args, &mut out).await?,
        Commands::Rebuild => rebuild(&config, &mut out).await?,
    }
    out.flush()?;
    Ok(())
}
