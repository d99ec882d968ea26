//! Rotate command

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use wikisnap_backup::VersionedNamer;
use wikisnap_core::{stamp, BackupConfig, ConfigFile};

use crate::commands::backup::{resolve_hostname, short_hostname};
use crate::output;

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// Tracked page prefix (defaults to the short host name)
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Directory holding the versions (defaults to the configured wiki)
    #[arg(long)]
    pub dir: Option<Utf8PathBuf>,

    /// Day of month used in the new version's name (defaults to the
    /// configured rotate day, or today when both directory and prefix are given)
    #[arg(short, long)]
    pub day: Option<u32>,

    /// Only show what would be copied
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

pub async fn run(args: RotateArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let (dir, prefix, day) = match (args.dir, args.prefix) {
        (Some(dir), Some(prefix)) => (dir, prefix, args.day),
        (dir, prefix) => {
            let config = BackupConfig::load(config_path, ConfigFile::default())
                .context("Failed to load configuration")?;
            let prefix = match prefix {
                Some(prefix) => prefix,
                None => resolve_hostname(&config)
                    .map(|host| short_hostname(&host).to_string())
                    .ok_or_else(|| anyhow!("No --prefix given and the host name is unknown"))?,
            };
            let day = args.day.or(Some(config.rotate_day));
            (dir.unwrap_or(config.src), prefix, day)
        }
    };

    let namer = VersionedNamer::new(prefix)?;
    let now = stamp::now();

    output::header("Rotate");
    output::kv("Directory", dir.as_str());
    output::kv("Prefix", namer.prefix());

    if args.dry_run {
        let proposed = namer.derive_name(day, false, &now)?;
        let listing: Vec<String> = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        match namer.plan_rotation(listing.as_slice(), &proposed) {
            Some(rotation) => output::info(&format!(
                "Would copy {} to {}",
                rotation.from, rotation.to
            )),
            None => output::info("Nothing to rotate"),
        }
        return Ok(());
    }

    match namer.rotate(dir.as_std_path(), day, &now)? {
        Some(rotation) => output::success(&format!(
            "Created {} from {}",
            rotation.to, rotation.from
        )),
        None => output::info("Nothing to rotate"),
    }
    Ok(())
}
