use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uds_core::IndexSessionConfig;

mod commands;

#[derive(Parser)]
#[command(name = "uds", about = "Exercise uds index sessions")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the user config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config,
    /// Hammer in-memory sessions from many tasks, then close them
    Stress(commands::stress::StressArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => IndexSessionConfig::from_file(path)?,
        None => IndexSessionConfig::load()?,
    };

    match cli.command {
        Commands::Config => commands::config::run(&config),
        Commands::Stress(args) => commands::stress::run(args, config).await,
    }
}
