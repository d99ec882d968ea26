//! wikisnap CLI - scheduled incremental wiki backups
//!
//! This is the main entry point for the wikisnap command-line interface.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Run command
    match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::Backup(args) => {
            commands::backup::run(args, cli.config.as_deref(), cli.verbose, cli.quiet).await
        }
        Commands::Rotate(args) => commands::rotate::run(args, cli.config.as_deref()).await,
        Commands::Cleanse(args) => commands::cleanse::run(args, cli.config.as_deref()).await,
        Commands::Rsync(args) => {
            commands::rsync::run(args, cli.config.as_deref(), cli.verbose).await
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
