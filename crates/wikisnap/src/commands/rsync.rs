//! Rsync command
//!
//! Thin wrapper around `rsync`, used on its own or as the mirror step at the
//! end of a backup run.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use tokio::process::Command;
use wikisnap_core::{BackupConfig, ConfigFile, ConsoleSink, Error, LogSink};

use crate::commands::backup::resolve_hostname;
use crate::output;

/// Directory under the host mirror that receives the plain rsync copy.
pub const MIRROR_DIR: &str = "vimwiki";

/// Exclusion used when no exclude file is given.
const DEFAULT_EXCLUDE: &str = "--exclude=*.sw[op]";

#[derive(Args, Debug)]
pub struct RsyncArgs {
    /// Source directory (defaults to the configured wiki)
    #[arg(short, long)]
    pub source: Option<Utf8PathBuf>,

    /// Destination directory (defaults to <backup-dir>/<hostname>/vimwiki)
    #[arg(short = 't', long)]
    pub dest: Option<Utf8PathBuf>,

    /// Delete destination files that are gone from the source
    #[arg(short, long)]
    pub delete: bool,

    /// Exclude file in rsync filter format
    #[arg(short = 'f', long)]
    pub exclude_from: Option<Utf8PathBuf>,

    /// Show what would be transferred
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Swap source and destination
    #[arg(short, long)]
    pub reverse: bool,
}

/// One rsync invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncOptions {
    pub source: Utf8PathBuf,
    pub dest: Utf8PathBuf,
    pub delete: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub exclude_from: Option<Utf8PathBuf>,
    pub reverse: bool,
}

impl RsyncOptions {
    pub fn new(source: impl Into<Utf8PathBuf>, dest: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            delete: false,
            dry_run: false,
            verbose: false,
            exclude_from: None,
            reverse: false,
        }
    }

    /// `(from, to)` after applying `reverse`.
    pub fn endpoints(&self) -> (&Utf8Path, &Utf8Path) {
        if self.reverse {
            (&self.dest, &self.source)
        } else {
            (&self.source, &self.dest)
        }
    }

    /// Arguments passed to rsync. An exclude file that does not exist falls
    /// back to the swap-file exclusion.
    pub fn build_args(&self) -> Vec<String> {
        let mut base = String::from("-a");
        if self.verbose {
            base.push('v');
        }
        if self.dry_run {
            base.push('n');
        }

        let mut args = vec![base];
        if self.delete {
            args.push("--delete".to_string());
        }
        args.push("--info=SKIP,STATS".to_string());
        match self.exclude_from.as_ref().filter(|file| file.exists()) {
            Some(file) => args.push(format!("--exclude-from={}", file)),
            None => args.push(DEFAULT_EXCLUDE.to_string()),
        }

        let (from, to) = self.endpoints();
        args.push(format!("{}/", from.as_str().trim_end_matches('/')));
        args.push(to.to_string());
        args
    }
}

/// Runs rsync, creating the target directory first.
pub async fn mirror(options: &RsyncOptions, sink: &dyn LogSink) -> Result<()> {
    let (_, to) = options.endpoints();
    if to.is_dir() {
        sink.emit(&format!("Directory Exists: {}", to));
    } else {
        tokio::fs::create_dir_all(to)
            .await
            .with_context(|| format!("Failed to create {}", to))?;
    }

    let args = options.build_args();
    sink.emit(&format!("RSYNC: -- rsync {}", args.join(" ")));
    tracing::debug!("rsync {}", args.join(" "));

    let output = Command::new("rsync")
        .args(&args)
        .output()
        .await
        .context("Failed to run rsync")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        sink.emit_error(&format!("RSYNC Error: {}", stderr.trim()));
        return Err(Error::process("rsync", output.status.to_string(), stderr.trim()).into());
    }

    sink.emit_output("rsync", &output.stdout);
    Ok(())
}

pub async fn run(args: RsyncArgs, config_path: Option<&Utf8Path>, verbose: u8) -> Result<()> {
    let (source, dest) = match (args.source, args.dest) {
        (Some(source), Some(dest)) => (source, dest),
        (source, dest) => {
            let config = BackupConfig::load(config_path, ConfigFile::default())
                .context("Failed to load configuration")?;
            let hostname = resolve_hostname(&config);
            let source = source.unwrap_or_else(|| config.src.clone());
            let dest = dest
                .unwrap_or_else(|| config.destination(hostname.as_deref()).join(MIRROR_DIR));
            (source, dest)
        }
    };

    let options = RsyncOptions {
        delete: args.delete,
        dry_run: args.dry_run,
        verbose: verbose > 0,
        exclude_from: args.exclude_from,
        reverse: args.reverse,
        ..RsyncOptions::new(source, dest)
    };

    let (from, to) = options.endpoints();
    output::header("Rsync");
    output::kv("From", from.as_str());
    output::kv("To", to.as_str());
    if options.dry_run {
        output::warning("DRY RUN MODE - nothing will be transferred");
    }
    println!();

    let sink = ConsoleSink::new(verbose > 0);
    let spinner = output::spinner("Running rsync...");
    let result = mirror(&options, &sink).await;
    spinner.finish_and_clear();
    result?;

    output::success("Rsync complete");
    Ok(())
}
