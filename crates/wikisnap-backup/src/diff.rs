//! Per-file change detection with an external line diff.
//!
//! The diff program is run with `-s` so identical files are reported
//! explicitly. Exit status 0 means identical, 1 means the files differ and
//! the captured output is kept as a `.diff` artifact in the staging
//! directory; anything else is an error for that file only.

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use wikisnap_core::config::DEFAULT_DIFF_PROGRAM;
use wikisnap_core::stamp::{self, timestamped_name};
use wikisnap_core::{ConsoleSink, LogSink};

/// Result of comparing one file against its destination mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Contents match; nothing was written
    Identical,
    /// Contents differ
    Changed {
        /// The `.diff` artifact in the staging directory
        diff: PathBuf,
        /// Full timestamped copy, for always-preserve files
        preserved: Option<PathBuf>,
    },
    /// The comparison failed; nothing usable was written
    Error { reason: String },
}

impl ChangeOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeOutcome::Changed { .. })
    }
}

/// Name of the diff artifact for `filename`: the text before its first `.`
/// plus `.diff` (`index.wiki` → `index.diff`).
pub fn diff_artifact_name(filename: &str) -> String {
    let stem = filename.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        format!("{}.diff", filename)
    } else {
        format!("{}.diff", stem)
    }
}

/// Compares files in a source directory against a destination mirror.
#[derive(Clone)]
pub struct ChangeDetector {
    program: String,
    always_preserve: HashSet<String>,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("program", &self.program)
            .field("always_preserve", &self.always_preserve)
            .finish()
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(Arc::new(ConsoleSink::disabled()))
    }
}

impl ChangeDetector {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            program: DEFAULT_DIFF_PROGRAM.to_string(),
            always_preserve: HashSet::new(),
            sink,
        }
    }

    /// Sets the diff program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the file names that get a full timestamped copy when changed.
    pub fn with_always_preserve<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.always_preserve = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Compares `source_dir/filename` with `dest_dir/filename`, writing any
    /// artifacts into `staging_dir`.
    pub fn compare(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        staging_dir: &Path,
        filename: &str,
    ) -> ChangeOutcome {
        self.compare_at(source_dir, dest_dir, staging_dir, filename, &stamp::now())
    }

    /// [`compare`](Self::compare) with an explicit clock for the preserved
    /// copy's name.
    pub fn compare_at(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        staging_dir: &Path,
        filename: &str,
        at: &NaiveDateTime,
    ) -> ChangeOutcome {
        let source = source_dir.join(filename);
        let dest = dest_dir.join(filename);

        let output = match Command::new(&self.program)
            .arg("-s")
            .arg(&source)
            .arg(&dest)
            .output()
        {
            Ok(output) => output,
            Err(e) => return self.failed(filename, format!("Diff Exception: {}", e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match output.status.code() {
            Some(0) => {
                if self.sink.is_enabled() {
                    self.sink
                        .emit(&format!("Excluding Identical File: {}", filename));
                }
                ChangeOutcome::Identical
            }
            Some(1) if !stdout.trim_end().ends_with("identical") => {
                match self.write_artifacts(&source, staging_dir, filename, &output.stdout, at) {
                    Ok(outcome) => outcome,
                    Err(e) => self.failed(filename, format!("Diff Error: {}", e)),
                }
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                self.failed(
                    filename,
                    format!("Diff Error ({}): {}", output.status, stderr.trim()),
                )
            }
        }
    }

    fn write_artifacts(
        &self,
        source: &Path,
        staging_dir: &Path,
        filename: &str,
        diff_text: &[u8],
        at: &NaiveDateTime,
    ) -> std::io::Result<ChangeOutcome> {
        let diff = staging_dir.join(diff_artifact_name(filename));
        if diff.exists() {
            tracing::warn!(
                "Diff artifact {} already exists and is overwritten by {}",
                diff.display(),
                filename
            );
        }
        fs::write(&diff, diff_text)?;

        let preserved = if self.always_preserve.contains(filename) {
            let target = staging_dir.join(timestamped_name(filename, true, at));
            if let Err(e) = fs::copy(source, &target) {
                // An errored comparison leaves nothing staged
                let _ = fs::remove_file(&diff);
                return Err(e);
            }
            tracing::debug!("Preserved full copy {}", target.display());
            Some(target)
        } else {
            None
        };

        if self.sink.is_enabled() {
            self.sink
                .emit(&format!("Diff {} success", diff.display()));
        }
        Ok(ChangeOutcome::Changed { diff, preserved })
    }

    fn failed(&self, filename: &str, reason: String) -> ChangeOutcome {
        tracing::warn!("{}: {}", filename, reason);
        self.sink.emit_error(&format!("{} {}", reason, filename));
        ChangeOutcome::Error { reason }
    }
}
