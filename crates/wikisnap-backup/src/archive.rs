//! Archive creation for staged snapshots.
//!
//! Packs everything below `<staging_root>/<relative_base>` into a single
//! tar.gz or zip file. Entry names are relative to the staging root, so every
//! entry starts with `relative_base`.

use crate::compression::{calculate_checksum, gzip_level, DEFAULT_COMPRESSION_LEVEL};
use crate::filters::ExtensionSet;
use crate::progress::BackupProgress;
use crate::walk::PathEnumerator;
use chrono::NaiveDateTime;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use wikisnap_core::stamp;
use wikisnap_core::{ArchiveFormat, Error, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An archive with fewer entries than this is probably empty of real content.
const MIN_EXPECTED_ENTRIES: usize = 2;

/// A finished archive.
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    /// Path to the created archive
    pub path: PathBuf,

    pub format: ArchiveFormat,

    /// Entry names, relative to the staging root
    pub entries: Vec<PathBuf>,

    /// Files left out by extension
    pub excluded: Vec<PathBuf>,

    /// Size of the archive in bytes
    pub size_bytes: u64,

    /// Hex SHA256 of the archive
    pub checksum: String,
}

impl BuiltArchive {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Configuration for archive creation.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Archive name prefix
    pub label: String,

    pub format: ArchiveFormat,

    /// Extensions left out of the archive
    pub excluded: ExtensionSet,

    /// Compression level (1-9), tar.gz only
    pub compression_level: u32,

    /// Directory the archive is written to
    pub output_dir: PathBuf,

    /// Whether to show progress
    pub show_progress: bool,
}

impl ArchiveConfig {
    pub fn new(
        label: impl Into<String>,
        format: ArchiveFormat,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() || label.contains('/') || label.contains('\\') {
            return Err(Error::validation(format!(
                "Invalid archive label '{}'",
                label
            )));
        }
        Ok(Self {
            label,
            format,
            excluded: ExtensionSet::default_excluded(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            output_dir: output_dir.into(),
            show_progress: false,
        })
    }

    pub fn with_excluded(mut self, excluded: ExtensionSet) -> Self {
        self.excluded = excluded;
        self
    }

    /// Sets the compression level.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.clamp(1, 9);
        self
    }

    /// Sets whether to show progress.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// `<label>_<YYYYMMDD>_<HHMM>.<ext>`
pub fn archive_file_name(label: &str, format: ArchiveFormat, at: &NaiveDateTime) -> String {
    format!("{}_{}.{}", label, stamp::stamp(at, true), format.extension())
}

/// Forward-slash entry name, independent of the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::Io(io::Error::other(e))
}

/// Archive builder for staged snapshots.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    config: ArchiveConfig,
}

impl ArchiveBuilder {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Archives every file below `staging_root/relative_base`.
    pub fn build(&self, staging_root: &Path, relative_base: &str) -> Result<BuiltArchive> {
        self.build_at(staging_root, relative_base, &stamp::now())
    }

    /// [`build`](Self::build) with an explicit clock for the archive name.
    pub fn build_at(
        &self,
        staging_root: &Path,
        relative_base: &str,
        at: &NaiveDateTime,
    ) -> Result<BuiltArchive> {
        let base = staging_root.join(relative_base);
        let mut walker = PathEnumerator::from_path(&base)?;
        let files = walker.enumerate_paths()?.to_vec();

        let mut included = Vec::with_capacity(files.len());
        let mut excluded = Vec::new();
        for file in files {
            if self.config.excluded.matches(&file) {
                tracing::debug!("Excluding {} from archive", file.display());
                excluded.push(file);
                continue;
            }
            let relative = match file.strip_prefix(staging_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => Path::new(relative_base).join(file.file_name().unwrap_or_default()),
            };
            included.push((file, relative));
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let path = self
            .config
            .output_dir
            .join(archive_file_name(&self.config.label, self.config.format, at));
        tracing::info!("Creating {}", path.display());

        let progress = if self.config.show_progress {
            let mut p = BackupProgress::new();
            p.start_archive(included.len() as u64, "Archiving...");
            Some(p)
        } else {
            None
        };

        let written = match self.config.format {
            ArchiveFormat::TarGz => self.write_tar(&path, &included, progress.as_ref()),
            ArchiveFormat::Zip => self.write_zip(&path, &included, progress.as_ref()),
        };
        if let Err(e) = written {
            if let Some(ref progress) = progress {
                progress.finish_all();
            }
            if let Err(remove) = fs::remove_file(&path) {
                tracing::debug!("Could not remove partial archive {}: {}", path.display(), remove);
            }
            return Err(e);
        }

        let entries: Vec<PathBuf> = included.into_iter().map(|(_, relative)| relative).collect();
        if let Some(ref progress) = progress {
            progress.finish_archive(&format!("Added {} files", entries.len()));
        }
        if entries.len() < MIN_EXPECTED_ENTRIES {
            tracing::warn!(
                "Likely empty archive {}: only {} entries",
                path.display(),
                entries.len()
            );
        }

        let size_bytes = fs::metadata(&path)?.len();
        let checksum = calculate_checksum(&path)?;

        Ok(BuiltArchive {
            path,
            format: self.config.format,
            entries,
            excluded,
            size_bytes,
            checksum,
        })
    }

    fn write_tar(
        &self,
        path: &Path,
        entries: &[(PathBuf, PathBuf)],
        progress: Option<&BackupProgress>,
    ) -> Result<()> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            gzip_level(self.config.compression_level),
        );
        let mut tar = TarBuilder::new(encoder);

        for (full, relative) in entries {
            tar.append_path_with_name(full, relative)?;
            tracing::debug!("Added {}", relative.display());
            if let Some(progress) = progress {
                progress.inc_archive();
            }
        }

        let encoder = tar.into_inner()?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    fn write_zip(
        &self,
        path: &Path,
        entries: &[(PathBuf, PathBuf)],
        progress: Option<&BackupProgress>,
    ) -> Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (full, relative) in entries {
            zip.start_file(entry_name(relative), options)
                .map_err(zip_error)?;
            let mut source = File::open(full)?;
            io::copy(&mut source, &mut zip)?;
            tracing::debug!("Added {}", relative.display());
            if let Some(progress) = progress {
                progress.inc_archive();
            }
        }

        zip.finish().map_err(zip_error)?;
        Ok(())
    }
}

/// Moves `archive` into `dir`, creating it. Falls back to copy and remove
/// across filesystems.
pub fn move_into(archive: &Path, dir: &Path) -> Result<PathBuf> {
    let name = archive
        .file_name()
        .ok_or_else(|| Error::validation(format!("{} has no file name", archive.display())))?;
    fs::create_dir_all(dir)?;
    let target = dir.join(name);

    if fs::rename(archive, &target).is_err() {
        fs::copy(archive, &target)?;
        fs::remove_file(archive)?;
    }
    tracing::info!("Moved {} to {}", archive.display(), target.display());
    Ok(target)
}
