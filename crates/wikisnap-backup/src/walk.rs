//! Directory traversal with ignore-prefix exclusion and a cleanse pass.
//!
//! Ignore prefixes are applied the same way to files and directories: any
//! visited path whose string form starts with a prefix is skipped, and an
//! ignored directory is not descended into.

use crate::filters::{DeleteMatcher, DeleteRules, IgnorePrefixes};
use crate::report::{CleanseReport, FileFailure};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use wikisnap_core::{Error, Result};

/// Options accepted by [`PathEnumerator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalOptions {
    /// Root of the walk
    pub path: PathBuf,

    /// Literal path prefixes to exclude
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Criteria for [`PathEnumerator::cleanse`]
    #[serde(default, alias = "delete")]
    pub delete_rules: DeleteRules,

    /// Report exclusions at info level instead of debug
    #[serde(default, alias = "dbg")]
    pub debug: bool,
}

impl TraversalOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_ignore<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delete_rules(mut self, rules: DeleteRules) -> Self {
        self.delete_rules = rules;
        self
    }
}

/// Walks a directory subtree.
#[derive(Debug, Clone)]
pub struct PathEnumerator {
    options: TraversalOptions,
    ignore: IgnorePrefixes,
    deleter: DeleteMatcher,
    paths: Vec<PathBuf>,
}

impl PathEnumerator {
    pub fn new(options: TraversalOptions) -> Result<Self> {
        if options.path.as_os_str().is_empty() {
            return Err(Error::validation("path must exist and be a string"));
        }

        let deleter = DeleteMatcher::new(&options.delete_rules)?;
        let ignore = IgnorePrefixes::new(options.ignore.iter().cloned());

        Ok(Self {
            options,
            ignore,
            deleter,
            paths: Vec::new(),
        })
    }

    /// Enumerator over `path` with no exclusions.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(TraversalOptions::new(path))
    }

    /// Builds an enumerator from loosely-typed options: either a path string
    /// or a mapping with a string `path` key plus optional `ignore`,
    /// `delete` and `dbg` keys.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(path) => Self::from_path(path),
            Value::Object(map) => {
                if !matches!(map.get("path"), Some(Value::String(_))) {
                    return Err(Error::validation("path must exist and be a string"));
                }
                let options: TraversalOptions = serde_json::from_value(value.clone())
                    .map_err(|e| Error::validation(format!("Invalid traversal options: {}", e)))?;
                Self::new(options)
            }
            _ => Err(Error::validation(
                "traversal options must be a path string or a mapping",
            )),
        }
    }

    pub fn root(&self) -> &Path {
        &self.options.path
    }

    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    /// Paths retained by the last [`enumerate_paths`](Self::enumerate_paths)
    /// or cleanse.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn ensure_root(&self) -> Result<()> {
        if !self.root().is_dir() {
            return Err(Error::validation(format!(
                "{} is not a directory",
                self.root().display()
            )));
        }
        Ok(())
    }

    fn note_excluded(&self, path: &Path) {
        if self.options.debug {
            tracing::info!("excluding {}", path.display());
        } else {
            tracing::debug!("excluding {}", path.display());
        }
    }

    /// Walk below the root, pruning ignored entries. Unreadable entries are
    /// logged and skipped.
    fn filtered_entries(&self) -> impl Iterator<Item = DirEntry> + '_ {
        WalkDir::new(self.root())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let ignored = self.ignore.is_ignored(entry.path());
                if ignored {
                    self.note_excluded(entry.path());
                }
                !ignored
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
    }

    /// Every regular file below the root that is not ignored. The result is
    /// retained as the enumerator's path collection.
    pub fn enumerate_paths(&mut self) -> Result<&[PathBuf]> {
        self.ensure_root()?;
        let paths: Vec<PathBuf> = self
            .filtered_entries()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        self.paths = paths;
        Ok(&self.paths)
    }

    /// Bare file names of every file below the root, ignore prefixes not
    /// applied.
    pub fn enumerate_files(&self) -> Result<Vec<String>> {
        self.ensure_root()?;
        let names = WalkDir::new(self.root())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        Ok(names)
    }

    /// Every subdirectory below the root that is neither ignored nor inside
    /// an ignored directory.
    pub fn enumerate_dirs(&self) -> Result<Vec<PathBuf>> {
        self.ensure_root()?;
        Ok(self
            .filtered_entries()
            .filter(|entry| entry.depth() > 0 && entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect())
    }

    /// Deletes retained files matching the delete rules.
    ///
    /// The deletion set is computed first from the retained collection
    /// (enumerating if it is empty); the collection is then replaced by one
    /// without the deleted paths. A dry run only reports what would be
    /// deleted and leaves both disk and collection untouched.
    pub fn cleanse(&mut self, dry_run: bool) -> Result<CleanseReport> {
        let mut report = CleanseReport {
            dry_run,
            ..CleanseReport::default()
        };

        if self.options.delete_rules.is_empty() {
            tracing::debug!("No files queued for deletion as no criteria were specified");
            return Ok(report);
        }

        if self.paths.is_empty() {
            self.enumerate_paths()?;
        }

        let root = self.root().to_path_buf();
        let pending: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|path| {
                let path = path.as_path();
                let relative = path.strip_prefix(&root).unwrap_or(path);
                self.deleter.should_delete(path, relative)
            })
            .cloned()
            .collect();

        if !pending.is_empty() {
            tracing::debug!("{} files are queued for deletion", pending.len());
        }

        if dry_run {
            for path in &pending {
                tracing::info!("D: dryrun deletion of {}", path.display());
            }
            report.deleted = pending;
            return Ok(report);
        }

        for path in pending {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Deleted {}", path.display());
                    report.deleted.push(path);
                }
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", path.display(), e);
                    report.failures.push(FileFailure::new(path, e));
                }
            }
        }

        let removed: HashSet<&PathBuf> = report.deleted.iter().collect();
        self.paths = self
            .paths
            .iter()
            .filter(|path| !removed.contains(path))
            .cloned()
            .collect();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::create_dir_all(base.join("diary")).unwrap();
        fs::create_dir_all(base.join("private/keys")).unwrap();
        fs::write(base.join("index.wiki"), "index").unwrap();
        fs::write(base.join(".index.wiki.swp"), "swap").unwrap();
        fs::write(base.join("diary/2026-10-17.wiki"), "today").unwrap();
        fs::write(base.join("private/secret.wiki"), "secret").unwrap();
        fs::write(base.join("private/keys/id.pyc"), "key").unwrap();
        temp
    }

    fn prefix(temp: &TempDir, rel: &str) -> String {
        temp.path().join(rel).to_string_lossy().into_owned()
    }

    #[test]
    fn test_enumerate_paths_all() {
        let temp = create_tree();
        let mut walker = PathEnumerator::from_path(temp.path()).unwrap();
        let paths = walker.enumerate_paths().unwrap();
        assert_eq!(paths.len(), 5);
        assert!(paths.contains(&temp.path().join("diary/2026-10-17.wiki")));
    }

    #[test]
    fn test_enumerate_paths_replaces_collection() {
        let temp = create_tree();
        let mut walker = PathEnumerator::from_path(temp.path()).unwrap();
        walker.enumerate_paths().unwrap();
        walker.enumerate_paths().unwrap();
        assert_eq!(walker.paths().len(), 5);
    }

    #[test]
    fn test_ignore_prefix_applies_to_files_and_dirs() {
        let temp = create_tree();
        let options = TraversalOptions::new(temp.path()).with_ignore([prefix(&temp, "private")]);
        let mut walker = PathEnumerator::new(options).unwrap();

        let paths = walker.enumerate_paths().unwrap().to_vec();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| !p.starts_with(temp.path().join("private"))));

        let dirs = walker.enumerate_dirs().unwrap();
        assert_eq!(dirs, vec![temp.path().join("diary")]);
    }

    #[test]
    fn test_enumerate_files_ignores_nothing() {
        let temp = create_tree();
        let options = TraversalOptions::new(temp.path()).with_ignore([prefix(&temp, "private")]);
        let walker = PathEnumerator::new(options).unwrap();

        let names = walker.enumerate_files().unwrap();
        assert_eq!(names.len(), 5);
        assert!(names.contains(&"secret.wiki".to_string()));
        assert!(names.iter().all(|n| !n.contains('/')));
    }

    #[test]
    fn test_enumerate_dirs() {
        let temp = create_tree();
        let walker = PathEnumerator::from_path(temp.path()).unwrap();
        let dirs = walker.enumerate_dirs().unwrap();
        assert_eq!(
            dirs,
            vec![
                temp.path().join("diary"),
                temp.path().join("private"),
                temp.path().join("private/keys"),
            ]
        );
    }

    #[test]
    fn test_missing_root() {
        let mut walker = PathEnumerator::from_path("/nonexistent/wikisnap/root").unwrap();
        assert!(walker.enumerate_paths().unwrap_err().is_validation());
    }

    #[test]
    fn test_from_value_validation() {
        assert!(PathEnumerator::from_value(&json!("/tmp")).is_ok());
        assert!(PathEnumerator::from_value(&json!({"path": "/tmp", "ignore": ["/tmp/x"]})).is_ok());

        let missing = PathEnumerator::from_value(&json!({"ignore": []})).unwrap_err();
        assert!(missing.is_validation());
        let not_string = PathEnumerator::from_value(&json!({"path": 42})).unwrap_err();
        assert!(not_string.is_validation());
        let wrong_type = PathEnumerator::from_value(&json!(["/tmp"])).unwrap_err();
        assert!(wrong_type.is_validation());
        assert!(PathEnumerator::from_path("").unwrap_err().is_validation());
    }

    #[test]
    fn test_from_value_legacy_keys() {
        let walker = PathEnumerator::from_value(&json!({
            "path": "/tmp",
            "delete": {"filetype": ["swp"], "regex": []},
            "dbg": true
        }))
        .unwrap();
        assert_eq!(walker.options().delete_rules.extensions, vec!["swp".to_string()]);
        assert!(walker.options().debug);
    }

    #[test]
    fn test_cleanse_dry_run_keeps_files() {
        let temp = create_tree();
        let options = TraversalOptions::new(temp.path()).with_delete_rules(DeleteRules {
            extensions: vec!["swp".to_string(), "pyc".to_string()],
            patterns: vec![],
        });
        let mut walker = PathEnumerator::new(options).unwrap();

        let report = walker.cleanse(true).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.deleted.len(), 2);
        assert!(temp.path().join(".index.wiki.swp").exists());
        assert_eq!(walker.paths().len(), 5);
    }

    #[test]
    fn test_cleanse_deletes_and_prunes_collection() {
        let temp = create_tree();
        let options = TraversalOptions::new(temp.path()).with_delete_rules(DeleteRules {
            extensions: vec!["swp".to_string()],
            patterns: vec!["diary/**".to_string()],
        });
        let mut walker = PathEnumerator::new(options).unwrap();
        walker.enumerate_paths().unwrap();

        let report = walker.cleanse(false).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(report.failures.is_empty());
        assert!(!temp.path().join(".index.wiki.swp").exists());
        assert!(!temp.path().join("diary/2026-10-17.wiki").exists());
        assert!(temp.path().join("index.wiki").exists());
        assert_eq!(walker.paths().len(), 3);
    }

    #[test]
    fn test_cleanse_without_rules() {
        let temp = create_tree();
        let mut walker = PathEnumerator::from_path(temp.path()).unwrap();
        let report = walker.cleanse(false).unwrap();
        assert!(report.deleted.is_empty());
        assert!(walker.paths().is_empty());
    }
}
