//! Snapshot sync: compare a source tree against its destination mirror and
//! stage what changed.
//!
//! Every directory of the source is mirrored under the destination and the
//! staging root. Files missing from the destination are copied to both; files
//! already there are handed to the [`ChangeDetector`], which only ever writes
//! into staging. Nothing is ever deleted from the destination.

use crate::diff::{ChangeDetector, ChangeOutcome};
use crate::filters::ExtensionSet;
use crate::progress::BackupProgress;
use crate::report::{ChangedFile, SyncReport};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use wikisnap_core::{ConsoleSink, Error, LogSink, Result};

/// Drives a full tree comparison.
pub struct SnapshotSync {
    excluded: ExtensionSet,
    detector: ChangeDetector,
    sink: Arc<dyn LogSink>,
    show_progress: bool,
}

impl Default for SnapshotSync {
    fn default() -> Self {
        let sink: Arc<dyn LogSink> = Arc::new(ConsoleSink::disabled());
        Self::new(ChangeDetector::new(sink.clone()), sink)
    }
}

impl SnapshotSync {
    pub fn new(detector: ChangeDetector, sink: Arc<dyn LogSink>) -> Self {
        Self {
            excluded: ExtensionSet::default_excluded(),
            detector,
            sink,
            show_progress: false,
        }
    }

    /// Replaces the excluded extension set. An empty set disables exclusion.
    pub fn with_excluded(mut self, excluded: ExtensionSet) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Compares `source_root` against `dest_root`, staging new files and diff
    /// artifacts under `staging_root`.
    ///
    /// Fails only when the roots themselves are unusable; problems with
    /// individual files or directories are collected in the report.
    pub fn sync(
        &self,
        source_root: &Path,
        dest_root: &Path,
        staging_root: &Path,
    ) -> Result<SyncReport> {
        if !source_root.is_dir() {
            return Err(Error::validation(format!(
                "Source {} is not a directory",
                source_root.display()
            )));
        }
        fs::create_dir_all(dest_root)?;
        fs::create_dir_all(staging_root)?;

        let mut progress = if self.show_progress {
            let mut p = BackupProgress::new();
            p.start_sync("Comparing source with destination...");
            Some(p)
        } else {
            None
        };

        let mut report = SyncReport::default();

        // Destination or staging nested in the source must not be walked.
        let walker = WalkDir::new(source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !(entry.path().starts_with(dest_root)
                        || entry.path().starts_with(staging_root))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(source_root).to_path_buf();
                    tracing::warn!("Cannot read {}: {}", path.display(), e);
                    report.fail(&path, e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            if let Some(ref mut progress) = progress {
                progress.update_sync(&entry.path().display().to_string());
            }
            self.sync_directory(source_root, entry.path(), dest_root, staging_root, &mut report);
        }

        if let Some(ref progress) = progress {
            progress.finish_sync(&format!(
                "Compared {} directories: {} added, {} changed, {} unchanged",
                report.directories,
                report.added.len(),
                report.changed.len(),
                report.unchanged.len()
            ));
            progress.finish_all();
        }

        tracing::info!(
            "Sync complete: {} added, {} changed, {} unchanged, {} excluded, {} failed",
            report.added.len(),
            report.changed.len(),
            report.unchanged.len(),
            report.excluded.len(),
            report.failures.len()
        );

        Ok(report)
    }

    fn sync_directory(
        &self,
        source_root: &Path,
        dir: &Path,
        dest_root: &Path,
        staging_root: &Path,
        report: &mut SyncReport,
    ) {
        let relative = dir.strip_prefix(source_root).unwrap_or(Path::new(""));
        let dest_dir = dest_root.join(relative);
        let staging_dir = staging_root.join(relative);
        report.directories += 1;

        if self.sink.is_enabled() {
            self.sink.emit(&format!(
                "{} -> {}",
                relative.display(),
                dest_dir.display()
            ));
        }

        // Filenames already mirrored; None when the mirror is new.
        let known: Option<HashSet<OsString>> = if dest_dir.is_dir() {
            match fs::read_dir(&dest_dir) {
                Ok(entries) => Some(entries.filter_map(|e| e.ok()).map(|e| e.file_name()).collect()),
                Err(e) => {
                    self.record_failure(report, &dest_dir, e);
                    return;
                }
            }
        } else {
            if let Err(e) = fs::create_dir_all(&dest_dir) {
                self.record_failure(report, &dest_dir, e);
                return;
            }
            None
        };

        if let Err(e) = fs::create_dir_all(&staging_dir) {
            self.record_failure(report, &staging_dir, e);
            return;
        }

        let mut files: Vec<(OsString, PathBuf)> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| (e.file_name(), e.path()))
                .filter(|(_, path)| path.is_file())
                .collect(),
            Err(e) => {
                self.record_failure(report, dir, e);
                return;
            }
        };
        files.sort();

        // Diff artifact -> source file that wrote it, for stem collisions
        let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();

        for (name, source_file) in files {
            if self.excluded.matches(&source_file) {
                if self.sink.is_enabled() {
                    self.sink
                        .emit(&format!("Excluding {}", name.to_string_lossy()));
                }
                report.excluded.push(source_file);
                continue;
            }

            let Some(name_str) = name.to_str() else {
                self.record_failure(report, &source_file, "file name is not valid UTF-8");
                continue;
            };

            if known.as_ref().is_some_and(|known| known.contains(&name)) {
                match self.detector.compare(dir, &dest_dir, &staging_dir, name_str) {
                    ChangeOutcome::Identical => report.unchanged.push(source_file),
                    ChangeOutcome::Changed { diff, preserved } => {
                        if let Some(earlier) = written.insert(diff.clone(), source_file.clone()) {
                            report.changed.retain(|changed| changed.path != earlier);
                            self.record_failure(
                                report,
                                &earlier,
                                format!("diff {} overwritten by {}", diff.display(), name_str),
                            );
                        }
                        report.changed.push(ChangedFile {
                            path: source_file,
                            diff,
                            preserved,
                        });
                    }
                    ChangeOutcome::Error { reason } => report.fail(&source_file, reason),
                }
            } else {
                if self.sink.is_enabled() {
                    self.sink.emit(&format!("Adding {}", name_str));
                }
                match copy_new_file(&source_file, &staging_dir, &dest_dir, &name) {
                    Ok(()) => report.added.push(source_file),
                    Err(e) => self.record_failure(report, &source_file, e),
                }
            }
        }
    }

    fn record_failure(&self, report: &mut SyncReport, path: &Path, reason: impl ToString) {
        let reason = reason.to_string();
        tracing::warn!("{}: {}", path.display(), reason);
        self.sink
            .emit_error(&format!("Sync Error: {} {}", reason, path.display()));
        report.fail(path, reason);
    }
}

/// Copies a new file into staging and into the destination mirror.
fn copy_new_file(
    source: &Path,
    staging_dir: &Path,
    dest_dir: &Path,
    name: &OsString,
) -> std::io::Result<()> {
    fs::copy(source, staging_dir.join(name))?;
    fs::copy(source, dest_dir.join(name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    struct Roots {
        temp: TempDir,
        src: PathBuf,
        dest: PathBuf,
    }

    impl Roots {
        fn staging(&self, name: &str) -> PathBuf {
            self.temp.path().join(name)
        }
    }

    fn roots() -> Roots {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("vimwiki");
        let dest = temp.path().join("backups/newton");
        fs::create_dir_all(src.join("diary")).unwrap();
        fs::write(src.join("index.wiki"), "= Index =\n").unwrap();
        fs::write(src.join("diary/2026-10-16.wiki"), "yesterday\n").unwrap();
        Roots { temp, src, dest }
    }

    fn diff_available() -> bool {
        Command::new("diff").arg("--version").output().is_ok()
    }

    /// A detector that fails every comparison it is asked to make.
    fn broken_detector() -> ChangeDetector {
        ChangeDetector::default().with_program("/nonexistent/bin/diff")
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn test_first_run_copies_everything() {
        let r = roots();
        let staging = r.staging("stage1");
        let syncer = SnapshotSync::new(broken_detector(), Arc::new(ConsoleSink::disabled()));

        let report = syncer.sync(&r.src, &r.dest, &staging).unwrap();

        assert_eq!(report.directories, 2);
        assert_eq!(report.added.len(), 2);
        assert!(report.failures.is_empty());
        assert!(r.dest.join("diary/2026-10-16.wiki").exists());
        assert!(staging.join("diary/2026-10-16.wiki").exists());
        assert!(staging.join("index.wiki").exists());
    }

    #[test]
    fn test_new_file_skips_change_detector() {
        let r = roots();
        SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();

        fs::write(r.src.join("notes.wiki"), "fresh\n").unwrap();
        // Remove the existing files from source so only the new one is visited.
        fs::remove_file(r.src.join("index.wiki")).unwrap();
        fs::remove_dir_all(r.src.join("diary")).unwrap();

        let staging = r.staging("stage2");
        let syncer = SnapshotSync::new(broken_detector(), Arc::new(ConsoleSink::disabled()));
        let report = syncer.sync(&r.src, &r.dest, &staging).unwrap();

        assert_eq!(report.added, vec![r.src.join("notes.wiki")]);
        assert!(report.failures.is_empty());
        assert!(r.dest.join("notes.wiki").exists());
        assert!(staging.join("notes.wiki").exists());
    }

    #[test]
    fn test_source_deletions_not_propagated() {
        let r = roots();
        fs::create_dir_all(&r.dest).unwrap();
        fs::write(r.dest.join("stale.wiki"), "old\n").unwrap();

        let syncer = SnapshotSync::new(broken_detector(), Arc::new(ConsoleSink::disabled()));
        syncer.sync(&r.src, &r.dest, &r.staging("stage1")).unwrap();

        assert!(r.dest.join("stale.wiki").exists());
    }

    #[test]
    fn test_changed_file_staged_as_diff() {
        if !diff_available() {
            eprintln!("diff not installed, skipping");
            return;
        }
        let r = roots();
        SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();

        fs::write(r.src.join("diary/2026-10-16.wiki"), "yesterday\nedited\n").unwrap();

        let staging = r.staging("stage2");
        let report = SnapshotSync::default()
            .sync(&r.src, &r.dest, &staging)
            .unwrap();

        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].diff, staging.join("diary/2026-10-16.diff"));
        assert_eq!(report.unchanged, vec![r.src.join("index.wiki")]);
        assert_eq!(files_under(&staging), vec![PathBuf::from("diary/2026-10-16.diff")]);
        // Destination keeps the previous content
        assert_eq!(
            fs::read_to_string(r.dest.join("diary/2026-10-16.wiki")).unwrap(),
            "yesterday\n"
        );
    }

    #[test]
    fn test_second_run_without_changes_stages_nothing() {
        if !diff_available() {
            eprintln!("diff not installed, skipping");
            return;
        }
        let r = roots();
        SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();

        let staging = r.staging("stage2");
        let report = SnapshotSync::default()
            .sync(&r.src, &r.dest, &staging)
            .unwrap();

        assert_eq!(report.staged_count(), 0);
        assert_eq!(report.unchanged.len(), 2);
        assert!(files_under(&staging).is_empty());
    }

    #[test]
    fn test_excluded_extensions() {
        let r = roots();
        fs::write(r.src.join(".index.wiki.swp"), "swap").unwrap();

        let report = SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();
        assert_eq!(report.excluded, vec![r.src.join(".index.wiki.swp")]);
        assert!(!r.dest.join(".index.wiki.swp").exists());

        let other_dest = r.temp.path().join("other");
        let report = SnapshotSync::default()
            .with_excluded(ExtensionSet::none())
            .sync(&r.src, &other_dest, &r.staging("stage2"))
            .unwrap();
        assert!(report.excluded.is_empty());
        assert!(other_dest.join(".index.wiki.swp").exists());
    }

    #[test]
    fn test_diff_failures_are_collected() {
        let r = roots();
        SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();
        fs::write(r.src.join("todo.wiki"), "new\n").unwrap();

        let syncer = SnapshotSync::new(broken_detector(), Arc::new(ConsoleSink::disabled()));
        let report = syncer.sync(&r.src, &r.dest, &r.staging("stage2")).unwrap();

        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.reason.contains("Diff Exception")));
        assert_eq!(report.added, vec![r.src.join("todo.wiki")]);
        assert!(r.dest.join("todo.wiki").exists());
    }

    #[test]
    fn test_diff_stem_collision_is_reported() {
        if !diff_available() {
            eprintln!("diff not installed, skipping");
            return;
        }
        let r = roots();
        fs::write(r.src.join("notes.md"), "draft\n").unwrap();
        fs::write(r.src.join("notes.wiki"), "page\n").unwrap();
        SnapshotSync::default()
            .sync(&r.src, &r.dest, &r.staging("stage1"))
            .unwrap();

        fs::write(r.src.join("notes.md"), "draft\nmd edit\n").unwrap();
        fs::write(r.src.join("notes.wiki"), "page\nwiki edit\n").unwrap();

        let staging = r.staging("stage2");
        let report = SnapshotSync::default()
            .sync(&r.src, &r.dest, &staging)
            .unwrap();

        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].path, r.src.join("notes.wiki"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, r.src.join("notes.md"));
        assert!(report.failures[0].reason.contains("overwritten by notes.wiki"));
        assert!(fs::read_to_string(staging.join("notes.diff"))
            .unwrap()
            .contains("wiki edit"));
    }

    #[test]
    fn test_missing_source_fails_fast() {
        let temp = TempDir::new().unwrap();
        let err = SnapshotSync::default()
            .sync(
                &temp.path().join("missing"),
                &temp.path().join("dest"),
                &temp.path().join("stage"),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!temp.path().join("dest").exists());
    }

    #[test]
    fn test_nested_destination_not_walked() {
        let r = roots();
        let dest = r.src.join("mirror");
        let report = SnapshotSync::default()
            .sync(&r.src, &dest, &r.staging("stage1"))
            .unwrap();
        assert_eq!(report.directories, 2);
        assert!(!dest.join("mirror").exists());
    }
}
