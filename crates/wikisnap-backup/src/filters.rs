//! File filtering for backup operations.
//!
//! - Extension sets (editor swap files, compiled artifacts) skipped by sync
//!   and archiving
//! - Ignore prefixes, matched as literal string prefixes of full paths
//! - Delete rules used by the cleanse pass

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use wikisnap_core::Result;

/// Extensions excluded from sync and archives unless overridden.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &["swo", "swp", "pyc", "o", "gz"];

/// A set of file extensions, stored without the leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    /// Builds a set from entries written with or without a leading dot
    /// (`".swp"` and `"swp"` are equivalent).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Editor swap files, compiled artifacts and nested archives.
    pub fn default_excluded() -> Self {
        Self::new(DEFAULT_EXCLUDED_EXTENSIONS)
    }

    /// Matches nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// `None` selects the default set; `Some(list)` uses exactly `list`.
    pub fn from_config(list: Option<&[String]>) -> Self {
        match list {
            Some(list) => Self::new(list),
            None => Self::default_excluded(),
        }
    }

    /// True when the path's final extension is in the set. Dotfiles without
    /// a further extension (`.bashrc`) never match.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| self.extensions.contains(ext.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

/// Literal path-prefix exclusion. Not a glob: a path is ignored iff its
/// string form starts with one of the prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnorePrefixes {
    prefixes: Vec<String>,
}

impl IgnorePrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.prefixes.is_empty() {
            return false;
        }
        let path_str = path.to_string_lossy();
        self.prefixes.iter().any(|prefix| path_str.starts_with(prefix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Criteria for the cleanse pass, as written in options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteRules {
    /// Extensions whose files are deleted
    #[serde(alias = "filetype")]
    pub extensions: Vec<String>,

    /// Glob patterns matched against the root-relative path
    #[serde(alias = "regex")]
    pub patterns: Vec<String>,
}

impl DeleteRules {
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.patterns.is_empty()
    }
}

/// Compiled form of [`DeleteRules`].
#[derive(Debug, Clone)]
pub struct DeleteMatcher {
    extensions: ExtensionSet,
    globset: GlobSet,
}

impl DeleteMatcher {
    pub fn new(rules: &DeleteRules) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &rules.patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            extensions: ExtensionSet::new(&rules.extensions),
            globset: builder.build()?,
        })
    }

    /// `path` is the full path (for the extension test), `relative` the
    /// root-relative path (for the glob test).
    pub fn should_delete(&self, path: &Path, relative: &Path) -> bool {
        self.extensions.matches(path) || self.globset.is_match(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excluded_extensions() {
        let set = ExtensionSet::default_excluded();

        assert!(set.matches(Path::new("wiki/.index.wiki.swp")));
        assert!(set.matches(Path::new("wiki/.index.wiki.swo")));
        assert!(set.matches(Path::new("build/main.o")));
        assert!(set.matches(Path::new("old/notes.tar.gz")));

        assert!(!set.matches(Path::new("wiki/index.wiki")));
        assert!(!set.matches(Path::new(".bashrc")));
        assert!(!set.matches(Path::new("Makefile")));
    }

    #[test]
    fn test_extension_set_accepts_leading_dot() {
        let set = ExtensionSet::new([".swp", "tmp", " .bak "]);
        assert!(set.matches(Path::new("a.swp")));
        assert!(set.matches(Path::new("a.tmp")));
        assert!(set.matches(Path::new("a.bak")));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["bak", "swp", "tmp"]);
    }

    #[test]
    fn test_extension_set_from_config() {
        assert_eq!(ExtensionSet::from_config(None), ExtensionSet::default_excluded());
        let empty: Vec<String> = Vec::new();
        assert!(ExtensionSet::from_config(Some(empty.as_slice())).is_empty());
    }

    #[test]
    fn test_ignore_prefix_is_literal() {
        let ignore = IgnorePrefixes::new(["/wiki/private"]);

        assert!(ignore.is_ignored(Path::new("/wiki/private")));
        assert!(ignore.is_ignored(Path::new("/wiki/private/diary.wiki")));
        // Plain string prefix, so siblings sharing the prefix match too
        assert!(ignore.is_ignored(Path::new("/wiki/private2/x.wiki")));
        assert!(!ignore.is_ignored(Path::new("/wiki/public/x.wiki")));

        let glob_like = IgnorePrefixes::new(["/wiki/*"]);
        assert!(!glob_like.is_ignored(Path::new("/wiki/a.wiki")));
    }

    #[test]
    fn test_delete_matcher() {
        let rules = DeleteRules {
            extensions: vec!["swp".to_string()],
            patterns: vec!["tmp/**".to_string()],
        };
        let matcher = DeleteMatcher::new(&rules).unwrap();

        assert!(matcher.should_delete(Path::new("/w/a.swp"), Path::new("a.swp")));
        assert!(matcher.should_delete(Path::new("/w/tmp/x.wiki"), Path::new("tmp/x.wiki")));
        assert!(!matcher.should_delete(Path::new("/w/x.wiki"), Path::new("x.wiki")));
    }

    #[test]
    fn test_delete_rules_accept_legacy_keys() {
        let rules: DeleteRules =
            serde_json::from_str(r#"{"filetype": ["pyc"], "regex": []}"#).unwrap();
        assert_eq!(rules.extensions, vec!["pyc".to_string()]);
        assert!(!rules.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let rules = DeleteRules {
            extensions: vec![],
            patterns: vec!["[invalid".to_string()],
        };
        assert!(DeleteMatcher::new(&rules).is_err());
    }
}
