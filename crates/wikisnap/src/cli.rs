//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

// Re-export command types for convenience
pub use crate::commands::backup::BackupArgs;
pub use crate::commands::cleanse::CleanseArgs;
pub use crate::commands::rotate::RotateArgs;
pub use crate::commands::rsync::RsyncArgs;

/// wikisnap - incremental, diff-based wiki backups
#[derive(Parser, Debug)]
#[command(name = "wikisnap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a YAML or JSON config file
    #[arg(short, long, global = true, env = "WIKISNAP_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync the wiki against its backup mirror and archive the changes
    Backup(BackupArgs),

    /// Copy the latest dated version of a tracked page to today's name
    Rotate(RotateArgs),

    /// Delete files matching extension or pattern rules
    Cleanse(CleanseArgs),

    /// Mirror a directory with rsync
    Rsync(RsyncArgs),

    /// Show version information
    Version(VersionArgs),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
