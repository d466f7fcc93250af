use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pickwave_config::RuntimeConfig;
use std::path::PathBuf;

mod init;
mod poll;
mod setup;
mod stream;

/// Acquire waveform windows around live seismic picks
#[derive(Parser)]
#[command(name = "pickwave")]
#[command(version)]
#[command(about = "Acquire waveform windows around live seismic picks", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Export directory for completed bundles (overrides config file)
    #[arg(short = 'd', long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Archive source address (overrides config file)
    #[arg(long, value_name = "ADDR")]
    archive: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Buffer the live record stream and complete picks as data arrives
    Stream,
    /// Register picks and re-request due windows on a fixed interval
    Poll,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(path) = &cli.config {
        pickwave_config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        pickwave_config::load_or_default().context("Failed to load configuration")?
    };

    apply_cli_overrides(&mut config, &cli);
    init::init_tracing(&config.log);

    match cli.mode {
        Mode::Stream => stream::run(config).await,
        Mode::Poll => poll::run(config).await,
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(dir) = &cli.export_dir {
        config.export.dir = dir.to_string_lossy().to_string();
    }
    if let Some(addr) = &cli.archive {
        config.archive.addr = addr.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}
