//! squaro-agent CLI - tabular Q-learning controller for external games
//!
//! This CLI provides a unified interface for:
//! - Driving a game over a line-delimited JSON protocol
//! - Inspecting saved value tables
//! - Compacting saved value tables to a smaller capacity

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "squaro-agent")]
#[command(version, about = "Q-learning controller with a bounded, persistent value table", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read observations on stdin and answer with actions on stdout
    Run(squaro_agent::cli::commands::run::RunArgs),

    /// Summarize a saved value table
    Inspect(squaro_agent::cli::commands::inspect::InspectArgs),

    /// Prune a saved value table down to a capacity
    Compact(squaro_agent::cli::commands::compact::CompactArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries the action protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => squaro_agent::cli::commands::run::execute(args),
        Commands::Inspect(args) => squaro_agent::cli::commands::inspect::execute(args),
        Commands::Compact(args) => squaro_agent::cli::commands::compact::execute(args),
    }
}
