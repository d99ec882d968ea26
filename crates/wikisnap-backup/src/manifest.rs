//! Run manifest written next to each archive.
//!
//! The manifest records what a backup run staged, what went into the archive
//! and the archive's checksum, so a run can be audited without unpacking it.

use crate::archive::BuiltArchive;
use crate::compression::CHECKSUM_ALGORITHM;
use crate::report::{FileFailure, SyncReport};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wikisnap_core::{ArchiveFormat, Error, Result};

/// Version of the run manifest format.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Suffix appended to the archive file name.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Metadata for one backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest format version
    pub version: String,

    /// Local time the run started
    pub created_at: NaiveDateTime,

    /// What created this manifest (e.g., "wikisnap v0.3.0")
    pub created_by: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub source: PathBuf,

    pub destination: PathBuf,

    pub archive: ArchiveInfo,

    pub sync: SyncSummary,
}

/// The archive a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub file_name: String,
    pub format: ArchiveFormat,
    pub entries: usize,
    pub excluded: usize,
    pub size_bytes: u64,
    pub checksum: ChecksumInfo,
}

/// Checksum information for integrity verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumInfo {
    /// Hash algorithm (sha256)
    pub algorithm: String,

    /// Hex-encoded checksum value
    pub value: String,
}

/// Per-category counts from the snapshot sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub directories: usize,
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub excluded: usize,
    /// Failures are listed in full; a run with failures is still archived
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl From<&FileFailure> for FailureEntry {
    fn from(failure: &FileFailure) -> Self {
        Self {
            path: failure.path.clone(),
            reason: failure.reason.clone(),
        }
    }
}

impl From<&SyncReport> for SyncSummary {
    fn from(report: &SyncReport) -> Self {
        Self {
            directories: report.directories,
            added: report.added.len(),
            changed: report.changed.len(),
            unchanged: report.unchanged.len(),
            excluded: report.excluded.len(),
            failures: report.failures.iter().map(FailureEntry::from).collect(),
        }
    }
}

impl From<&BuiltArchive> for ArchiveInfo {
    fn from(archive: &BuiltArchive) -> Self {
        Self {
            file_name: archive.file_name(),
            format: archive.format,
            entries: archive.entries.len(),
            excluded: archive.excluded.len(),
            size_bytes: archive.size_bytes,
            checksum: ChecksumInfo {
                algorithm: CHECKSUM_ALGORITHM.to_string(),
                value: archive.checksum.clone(),
            },
        }
    }
}

impl RunManifest {
    pub fn new(
        created_at: NaiveDateTime,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        archive: &BuiltArchive,
        report: &SyncReport,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            created_at,
            created_by: format!("wikisnap v{}", env!("CARGO_PKG_VERSION")),
            hostname: None,
            source: source.into(),
            destination: destination.into(),
            archive: ArchiveInfo::from(archive),
            sync: SyncSummary::from(report),
        }
    }

    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    /// Serializes the manifest to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(Error::validation(format!(
                "Incompatible manifest version: {} (expected {})",
                manifest.version, MANIFEST_VERSION
            )));
        }
        Ok(manifest)
    }

    /// `<archive><MANIFEST_SUFFIX>`
    pub fn path_for(archive: &Path) -> PathBuf {
        let mut name = archive.as_os_str().to_os_string();
        name.push(MANIFEST_SUFFIX);
        PathBuf::from(name)
    }

    /// Writes the manifest next to `archive` and returns its path.
    pub fn write_next_to(&self, archive: &Path) -> Result<PathBuf> {
        let path = Self::path_for(archive);
        fs::write(&path, self.to_json()?)?;
        tracing::debug!("Wrote manifest {}", path.display());
        Ok(path)
    }
}
