use std::path::PathBuf;

use clap::Parser;
use tangem_sdk::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::Commands;

#[derive(Parser)]
#[command(version, about = "Tangem card CLI over PC/SC readers")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Session configuration as a JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("trace")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    commands::run(cli.command, cli.reader.as_deref(), config)
}
