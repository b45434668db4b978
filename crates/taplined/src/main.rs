//! taplined — the Tapline daemon.
//!
//! Single binary that assembles a whole tap network in one process:
//! - In-process topic bus
//! - Keg devices and one valve box per configured tap
//! - Telemetry aggregator backed by the redb store
//! - Optional pour simulator
//!
//! # Usage
//!
//! ```text
//! taplined init --path tapline.toml
//! taplined standalone --config tapline.toml --data-dir /var/lib/tapline --simulate-pours
//! taplined report --data-dir /var/lib/tapline
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod report;
mod simulate;
mod standalone;

#[derive(Parser)]
#[command(name = "taplined", about = "Tapline draught network daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every tap, keg and the aggregator in this process.
    Standalone {
        /// Path to tapline.toml. A built-in single-tap layout is used if
        /// the file does not exist.
        #[arg(long, default_value = "tapline.toml")]
        config: PathBuf,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/tapline")]
        data_dir: PathBuf,

        /// Drive the taps with simulated pours and cellar refills.
        #[arg(long)]
        simulate_pours: bool,
    },
    /// Write a scaffold tapline.toml.
    Init {
        #[arg(short, long, default_value = "tapline.toml")]
        path: PathBuf,

        /// Id of the scaffolded tap.
        #[arg(long, default_value = "tap-1")]
        tap: String,

        /// Beer served by the scaffolded tap.
        #[arg(long, default_value = "House Lager")]
        beer: String,
    },
    /// Print efficiency, depletion forecasts and open orders.
    Report {
        #[arg(long, default_value = "/var/lib/tapline")]
        data_dir: PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,taplined=debug,tapline=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            config,
            data_dir,
            simulate_pours,
        } => standalone::run(&config, &data_dir, simulate_pours).await,
        Command::Init { path, tap, beer } => init(&path, &tap, &beer),
        Command::Report { data_dir, format } => report::run(&data_dir, &format),
    }
}

fn init(path: &std::path::Path, tap: &str, beer: &str) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let config = tapline_core::TaplineConfig::scaffold(tap, beer);
    std::fs::write(path, config.to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
