use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commitledger::{config, Daemon, RawConfig, RunOptions};

#[derive(Parser)]
#[command(name = "commitledger")]
#[command(about = "Incremental GitHub commit history mirror")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mirror daemon: initial sync, then the cron loop
    Run,

    /// Run a single sync cycle and exit
    Once,

    /// Print the validated run options and exit
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting CommitLedger v{}", env!("CARGO_PKG_VERSION"));

    let options = load_options(cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(options).await,
        Commands::Once => cmd_once(options).await,
        Commands::Config => cmd_config(&options),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

/// Load raw config from the given path or the default location, then
/// validate it. Invalid configuration aborts before any store or network
/// access.
fn load_options(config_path: Option<std::path::PathBuf>) -> Result<RunOptions> {
    let raw = match config_path {
        Some(path) => RawConfig::load(&path)?,
        None => RawConfig::load_or_default()?,
    };

    config::validate(raw).context("Invalid configuration")
}

async fn cmd_run(options: RunOptions) -> Result<()> {
    let daemon = Daemon::new(options)?;
    daemon.run().await
}

async fn cmd_once(options: RunOptions) -> Result<()> {
    let daemon = Daemon::new(options)?;
    let summary = daemon.run_once().await?;

    println!(
        "Cycle complete: {} fetched, {} stored in {:.2}s",
        summary.fetched,
        summary.stored,
        summary.duration.as_secs_f64()
    );

    Ok(())
}

fn cmd_config(options: &RunOptions) -> Result<()> {
    let rendered =
        serde_yaml::to_string(options).context("Failed to render validated options")?;
    print!("{}", rendered);

    Ok(())
}
