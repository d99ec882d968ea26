//! Backup command
//!
//! One run: sync the wiki against its host mirror, archive the staged
//! changes into the mirror with a manifest, drop the staging tree, then
//! optionally rsync a plain copy and rotate the host's tracked page.

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use wikisnap_backup::{
    move_into, ArchiveBuilder, ArchiveConfig, BuiltArchive, ChangeDetector, ExtensionSet,
    RunManifest, SnapshotSync, SyncReport, VersionedNamer,
};
use wikisnap_core::utils::detect_hostname;
use wikisnap_core::{
    stamp, ArchiveFormat, BackupConfig, ConfigFile, ConsoleSink, FileSink, LogSink,
};

use crate::commands::rsync::{self, RsyncOptions, MIRROR_DIR};
use crate::output;

#[derive(Args, Debug, Default)]
pub struct BackupArgs {
    /// Wiki directory to back up
    #[arg(short, long)]
    pub src: Option<Utf8PathBuf>,

    /// Backup root; the mirror lives in <backup-dir>/<hostname>
    #[arg(short, long)]
    pub backup_dir: Option<Utf8PathBuf>,

    /// Working directory for the dated staging tree and the archive
    #[arg(short = 'w', long)]
    pub temp_dir: Option<Utf8PathBuf>,

    /// Host name used for the mirror directory and rotation prefix
    #[arg(long)]
    pub hostname: Option<String>,

    /// Write debug output to this file (the date is inserted into its name)
    #[arg(short, long)]
    pub debug_file: Option<Utf8PathBuf>,

    /// Archive format (tar.gz or zip)
    #[arg(short, long)]
    pub format: Option<ArchiveFormat>,

    /// Archive name prefix
    #[arg(short, long)]
    pub label: Option<String>,

    /// Extension to leave out (repeatable, replaces the default set)
    #[arg(short = 'x', long = "exclude-ext")]
    pub exclude_ext: Vec<String>,

    /// Gzip compression level (1-9)
    #[arg(long)]
    pub compression: Option<u32>,

    /// Rsync the wiki into <mirror>/vimwiki after archiving
    #[arg(short, long)]
    pub update: bool,

    /// Rotate the host's tracked page after the backup
    #[arg(short = 'n', long = "new")]
    pub rotate: bool,

    /// Day of month written into the rotated page's name (default 1)
    #[arg(long)]
    pub rotate_day: Option<u32>,

    /// Keep the staging tree after archiving
    #[arg(long)]
    pub keep_staging: bool,
}

impl BackupArgs {
    /// Flag values as a config overlay; unset flags leave the file's values.
    fn to_overrides(&self, verbose: u8) -> ConfigFile {
        ConfigFile {
            src: self.src.clone(),
            backup_dir: self.backup_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            hostname: self.hostname.clone(),
            debug_file: self.debug_file.clone(),
            verbose: (verbose > 0).then_some(verbose),
            update: self.update.then_some(true),
            rotate: self.rotate.then_some(true),
            rotate_day: self.rotate_day,
            format: self.format,
            label: self.label.clone(),
            excluded_extensions: (!self.exclude_ext.is_empty()).then(|| self.exclude_ext.clone()),
            compression_level: self.compression,
            ..ConfigFile::default()
        }
    }
}

/// Configured host name, else the machine's.
pub(crate) fn resolve_hostname(config: &BackupConfig) -> Option<String> {
    config.hostname.clone().or_else(detect_hostname)
}

/// Host name up to the first `.`.
pub(crate) fn short_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

/// Everything the blocking part of a run needs.
struct BackupPlan {
    config: BackupConfig,
    destination: Utf8PathBuf,
    staging: Utf8PathBuf,
    date: String,
    hostname: Option<String>,
    started: NaiveDateTime,
    show_progress: bool,
    keep_staging: bool,
    sink: Arc<dyn LogSink>,
}

struct ArchivedRun {
    path: PathBuf,
    built: BuiltArchive,
    manifest: PathBuf,
}

struct BackupOutcome {
    report: SyncReport,
    archive: Option<ArchivedRun>,
}

impl BackupPlan {
    /// Sync, archive, move, manifest, staging cleanup. Only an unusable
    /// source or destination fails the run; an archive failure is logged and
    /// reported as a missing archive.
    fn execute(&self) -> Result<BackupOutcome> {
        let config = &self.config;
        let excluded = ExtensionSet::from_config(config.excluded_extensions.as_deref());

        let detector = ChangeDetector::new(self.sink.clone())
            .with_program(&config.diff_program)
            .with_always_preserve(config.always_preserve.iter().cloned());
        let report = SnapshotSync::new(detector, self.sink.clone())
            .with_excluded(excluded.clone())
            .with_progress(self.show_progress)
            .sync(
                config.src.as_std_path(),
                self.destination.as_std_path(),
                self.staging.as_std_path(),
            )
            .context("Snapshot sync failed")?;

        let archive = match self.archive(&report, excluded) {
            Ok(archived) => Some(archived),
            Err(e) => {
                tracing::error!("Archive not created: {:#}", e);
                self.sink.emit_error(&format!("Missing archive: {:#}", e));
                None
            }
        };

        if self.keep_staging {
            tracing::info!("Keeping staging tree {}", self.staging);
        } else if let Err(e) = std::fs::remove_dir_all(&self.staging) {
            tracing::warn!("Failed to remove staging tree {}: {}", self.staging, e);
        }

        Ok(BackupOutcome { report, archive })
    }

    fn archive(&self, report: &SyncReport, excluded: ExtensionSet) -> Result<ArchivedRun> {
        let config = &self.config;
        let archive_config =
            ArchiveConfig::new(&config.label, config.format, config.temp_dir.as_std_path())?
                .with_excluded(excluded)
                .with_compression_level(config.compression_level)
                .with_progress(self.show_progress);

        let built = ArchiveBuilder::new(archive_config)
            .build_at(config.temp_dir.as_std_path(), &self.date, &self.started)
            .context("Failed to build archive")?;
        let path = move_into(&built.path, self.destination.as_std_path())
            .context("Failed to move archive into the mirror")?;
        self.sink.emit(&format!("Archive {}", path.display()));

        let manifest = RunManifest::new(
            self.started,
            config.src.as_std_path(),
            self.destination.as_std_path(),
            &built,
            report,
        )
        .with_hostname(self.hostname.clone())
        .write_next_to(&path)
        .context("Failed to write manifest")?;

        Ok(ArchivedRun {
            path,
            built,
            manifest,
        })
    }
}

pub async fn run(
    args: BackupArgs,
    config_path: Option<&Utf8Path>,
    verbose: u8,
    quiet: bool,
) -> Result<()> {
    let config = BackupConfig::load(config_path, args.to_overrides(verbose))
        .context("Failed to load configuration")?;
    let started = stamp::now();
    let hostname = resolve_hostname(&config);
    let destination = config.destination(hostname.as_deref());
    let (staging, date) = config.staging_dir(&started);

    if !quiet {
        output::header("Wiki Backup");
        output::kv("Source", config.src.as_str());
        output::kv("Mirror", destination.as_str());
        output::kv("Staging", staging.as_str());
        output::kv("Format", &config.format.to_string());
        println!();
    }

    let file_sink = match config.debug_log_path(&started) {
        Some(path) => {
            let sink = FileSink::create(path.as_std_path())
                .with_context(|| format!("Failed to create debug file {}", path))?;
            if !quiet {
                output::info(&format!("Using debug file {}", path));
            }
            Some(Arc::new(sink))
        }
        None => None,
    };
    let sink: Arc<dyn LogSink> = match &file_sink {
        Some(file) => file.clone(),
        None => Arc::new(ConsoleSink::new(config.verbose > 0)),
    };

    let plan = BackupPlan {
        config: config.clone(),
        destination: destination.clone(),
        staging,
        date,
        hostname: hostname.clone(),
        started,
        show_progress: !quiet && console::Term::stdout().is_term(),
        keep_staging: args.keep_staging,
        sink: sink.clone(),
    };
    let outcome = match tokio::task::spawn_blocking(move || plan.execute()).await {
        Ok(outcome) => outcome,
        Err(e) => Err(anyhow!("Backup task failed: {}", e)),
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            close_sink(file_sink.as_deref());
            return Err(e);
        }
    };

    let mut problems = Vec::new();
    if outcome.archive.is_none() {
        problems.push("no archive was created".to_string());
    }

    if config.update {
        let options = RsyncOptions {
            verbose: config.verbose > 0,
            ..RsyncOptions::new(config.src.clone(), destination.join(MIRROR_DIR))
        };
        if let Err(e) = rsync::mirror(&options, sink.as_ref()).await {
            tracing::error!("Rsync failed: {:#}", e);
            problems.push(format!("rsync failed: {:#}", e));
        }
    }

    if config.rotate {
        match rotate_tracked_page(&config, hostname.as_deref(), &started) {
            Ok(Some(message)) => sink.emit(&message),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Rotation failed: {:#}", e);
                problems.push(format!("rotation failed: {:#}", e));
            }
        }
    }

    close_sink(file_sink.as_deref());

    if !quiet {
        print_summary(&outcome);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Backup finished with errors: {}", problems.join("; ")))
    }
}

fn rotate_tracked_page(
    config: &BackupConfig,
    hostname: Option<&str>,
    at: &NaiveDateTime,
) -> Result<Option<String>> {
    let host = hostname.ok_or_else(|| anyhow!("host name is unknown"))?;
    let namer = VersionedNamer::new(short_hostname(host))?;
    let rotation = namer.rotate(config.src.as_std_path(), Some(config.rotate_day), at)?;
    Ok(rotation.map(|r| format!("Created new file {} from {}", r.to, r.from)))
}

fn close_sink(sink: Option<&FileSink>) {
    if let Some(sink) = sink {
        if let Err(e) = sink.close() {
            tracing::warn!("Failed to close debug file {}: {}", sink.path().display(), e);
        }
    }
}

fn print_summary(outcome: &BackupOutcome) {
    let report = &outcome.report;
    println!();
    match &outcome.archive {
        Some(archived) => {
            output::success("Backup created successfully");
            println!();
            output::kv("Archive", &archived.path.display().to_string());
            output::kv("Entries", &archived.built.entries.len().to_string());
            output::kv("Size", &output::format_bytes(archived.built.size_bytes));
            output::kv("SHA256", &archived.built.checksum);
            output::kv("Manifest", &archived.manifest.display().to_string());
        }
        None => output::error("Backup finished without an archive"),
    }
    output::kv("Added", &report.added.len().to_string());
    output::kv("Changed", &report.changed.len().to_string());
    output::kv("Unchanged", &report.unchanged.len().to_string());
    output::kv("Excluded", &report.excluded.len().to_string());

    if report.has_failures() {
        output::warning(&format!("{} files could not be backed up:", report.failures.len()));
        for failure in &report.failures {
            println!(
                "  {} {}",
                console::style(failure.path.display()).dim(),
                failure.reason
            );
        }
    }
}
