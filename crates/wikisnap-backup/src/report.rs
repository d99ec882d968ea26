//! Outcome records returned by traversal and sync operations.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// A file that could not be processed. The run continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of a cleanse pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanseReport {
    /// Deleted files, or the files that would be deleted on a dry run
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub dry_run: bool,
}

/// A changed file and the artifacts written for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: PathBuf,
    pub diff: PathBuf,
    pub preserved: Option<PathBuf>,
}

/// Everything a snapshot sync did, per file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub directories: usize,
    /// New files copied to destination and staging
    pub added: Vec<PathBuf>,
    /// Files that differ from the destination mirror
    pub changed: Vec<ChangedFile>,
    /// Files identical to the destination mirror
    pub unchanged: Vec<PathBuf>,
    /// Files skipped by extension
    pub excluded: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl SyncReport {
    /// Number of files that produced staged content.
    pub fn staged_count(&self) -> usize {
        self.added.len() + self.changed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, path: &Path, reason: impl ToString) {
        self.failures.push(FileFailure::new(path, reason));
    }
}
