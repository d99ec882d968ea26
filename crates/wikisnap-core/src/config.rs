//! Configuration file loading and validation
//!
//! A run is configured from an optional YAML or JSON file, overlaid with
//! command-line values. `src`, `backup_dir` and `temp_dir` are required once a
//! file is given; without a file they fall back to home-relative defaults.

use crate::error::{Error, Result};
use crate::stamp;
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Default archive label
pub const DEFAULT_LABEL: &str = "vimwiki_diff_backup";

/// Files that always get a full timestamped copy when they change
pub const DEFAULT_ALWAYS_PRESERVE: &[&str] = &["index.wiki"];

/// Default diff program
pub const DEFAULT_DIFF_PROGRAM: &str = "diff";

/// Day of month written into a rotated page's name
pub const DEFAULT_ROTATE_DAY: u32 = 1;

/// Archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "tar.gz", alias = "targz", alias = "tgz")]
    TarGz,
    #[default]
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    /// File extension without leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tar.gz" | "targz" | "tgz" | "tar" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(Error::validation(format!(
                "Unknown archive format '{}'. Valid formats: tar.gz, zip",
                other
            ))),
        }
    }
}

/// Raw configuration as read from disk or collected from flags.
///
/// Every field is optional so that file values and overrides can be layered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Directory containing the wiki to back up
    pub src: Option<Utf8PathBuf>,

    /// Directory where backups are kept (a per-host subdirectory is used)
    pub backup_dir: Option<Utf8PathBuf>,

    /// Working directory holding the per-run staging tree
    pub temp_dir: Option<Utf8PathBuf>,

    /// Host name override; detected when absent
    pub hostname: Option<String>,

    /// Debug log file; the date is appended to its name
    pub debug_file: Option<Utf8PathBuf>,

    /// Verbosity level
    pub verbose: Option<u8>,

    /// Mirror the source into the backup directory with rsync after archiving
    pub update: Option<bool>,

    /// Rotate the per-host tracked page after the run
    #[serde(alias = "new")]
    pub rotate: Option<bool>,

    /// Day of month used in rotated page names (1-31)
    pub rotate_day: Option<u32>,

    /// Archive format
    pub format: Option<ArchiveFormat>,

    /// Archive base label
    pub label: Option<String>,

    /// Extensions skipped during sync and archiving (empty list disables)
    pub excluded_extensions: Option<Vec<String>>,

    /// File names copied in full whenever they change
    pub always_preserve: Option<Vec<String>>,

    /// Diff program
    pub diff_program: Option<String>,

    /// Gzip compression level (1-9)
    pub compression_level: Option<u32>,
}

impl ConfigFile {
    /// Load a configuration file. `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let config = if path.extension() == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml_ng::from_str(&content)?
        };

        tracing::debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Home-relative defaults used when no configuration file is given.
    pub fn defaults() -> Result<Self> {
        let home = Utf8PathBuf::try_from(get_home_dir()?)
            .map_err(|_| Error::validation("Home directory path is not valid UTF-8"))?;

        Ok(Self {
            src: Some(home.join("vimwiki")),
            backup_dir: Some(home.join("backups")),
            temp_dir: Some(home.join("workspace")),
            ..Self::default()
        })
    }

    /// Overlays `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: ConfigFile) -> Self {
        Self {
            src: overrides.src.or(self.src),
            backup_dir: overrides.backup_dir.or(self.backup_dir),
            temp_dir: overrides.temp_dir.or(self.temp_dir),
            hostname: overrides.hostname.or(self.hostname),
            debug_file: overrides.debug_file.or(self.debug_file),
            verbose: overrides.verbose.or(self.verbose),
            update: overrides.update.or(self.update),
            rotate: overrides.rotate.or(self.rotate),
            rotate_day: overrides.rotate_day.or(self.rotate_day),
            format: overrides.format.or(self.format),
            label: overrides.label.or(self.label),
            excluded_extensions: overrides.excluded_extensions.or(self.excluded_extensions),
            always_preserve: overrides.always_preserve.or(self.always_preserve),
            diff_program: overrides.diff_program.or(self.diff_program),
            compression_level: overrides.compression_level.or(self.compression_level),
        }
    }
}

/// Validated configuration for a backup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupConfig {
    pub src: Utf8PathBuf,
    pub backup_dir: Utf8PathBuf,
    pub temp_dir: Utf8PathBuf,
    pub hostname: Option<String>,
    pub debug_file: Option<Utf8PathBuf>,
    pub verbose: u8,
    pub update: bool,
    pub rotate: bool,
    pub rotate_day: u32,
    pub format: ArchiveFormat,
    pub label: String,
    /// `None` selects the default exclusion set
    pub excluded_extensions: Option<Vec<String>>,
    pub always_preserve: Vec<String>,
    pub diff_program: String,
    pub compression_level: u32,
}

impl TryFrom<ConfigFile> for BackupConfig {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let src = file.src.ok_or_else(|| Error::missing_field("src"))?;
        let backup_dir = file
            .backup_dir
            .ok_or_else(|| Error::missing_field("backup_dir"))?;
        let temp_dir = file
            .temp_dir
            .ok_or_else(|| Error::missing_field("temp_dir"))?;

        let compression_level = file.compression_level.unwrap_or(6);
        if !(1..=9).contains(&compression_level) {
            return Err(Error::validation(format!(
                "Compression level must be 1-9, got {}",
                compression_level
            )));
        }

        let rotate_day = file.rotate_day.unwrap_or(DEFAULT_ROTATE_DAY);
        if !(1..=31).contains(&rotate_day) {
            return Err(Error::validation(format!(
                "Rotate day must be 1-31, got {}",
                rotate_day
            )));
        }

        let label = file.label.unwrap_or_else(|| DEFAULT_LABEL.to_string());
        if label.trim().is_empty() || label.contains('/') {
            return Err(Error::validation(format!("Invalid archive label '{}'", label)));
        }

        Ok(Self {
            src,
            backup_dir,
            temp_dir,
            hostname: file.hostname.filter(|h| !h.trim().is_empty()),
            debug_file: file.debug_file,
            verbose: file.verbose.unwrap_or(0),
            update: file.update.unwrap_or(false),
            rotate: file.rotate.unwrap_or(false),
            rotate_day,
            format: file.format.unwrap_or_default(),
            label,
            excluded_extensions: file.excluded_extensions,
            always_preserve: file.always_preserve.unwrap_or_else(|| {
                DEFAULT_ALWAYS_PRESERVE
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            diff_program: file
                .diff_program
                .unwrap_or_else(|| DEFAULT_DIFF_PROGRAM.to_string()),
            compression_level,
        })
    }
}

impl BackupConfig {
    /// Resolves the run configuration: the file at `path` (or the home
    /// defaults when there is none) overlaid with `overrides`, then validated.
    pub fn load(path: Option<&Utf8Path>, overrides: ConfigFile) -> Result<Self> {
        let base = match path {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::defaults()?,
        };
        Self::try_from(base.merge(overrides))
    }

    /// Destination mirror: `<backup_dir>/<hostname>`, or `backup_dir` itself
    /// when no host name is known.
    pub fn destination(&self, hostname: Option<&str>) -> Utf8PathBuf {
        match hostname {
            Some(host) => self.backup_dir.join(host),
            None => self.backup_dir.clone(),
        }
    }

    /// Staging directory for a run: `<temp_dir>/<YYYYMMDD>`.
    pub fn staging_dir(&self, at: &NaiveDateTime) -> (Utf8PathBuf, String) {
        let date = stamp::stamp(at, false);
        (self.temp_dir.join(&date), date)
    }

    /// Debug log path with the date inserted into its name.
    pub fn debug_log_path(&self, at: &NaiveDateTime) -> Option<Utf8PathBuf> {
        self.debug_file.as_ref().map(|path| {
            let name = stamp::timestamped_name(path.file_name().unwrap_or("debug"), false, at);
            path.with_file_name(name)
        })
    }
}
