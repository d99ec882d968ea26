//! Dated rotation of a periodically-updated tracked page.
//!
//! Versions are named `<prefix>_<YYYYMMDD>[_<HHMM>].wiki`, the same stamp the
//! preserved copies get. All fields are fixed-width and zero-padded, so the
//! lexicographically greatest name with the prefix is the most recent
//! version. `<prefix>_0000` is the "nothing yet" sentinel and sorts below
//! every real version.

use chrono::{Datelike, NaiveDateTime};
use std::fs;
use std::path::Path;
use wikisnap_core::stamp;
use wikisnap_core::{Error, Result};

/// Extension of tracked pages
pub const TRACKED_EXTENSION: &str = "wiki";

/// A planned (or performed) copy of the latest version to a new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    pub from: String,
    pub to: String,
}

/// Derives version names for one tracked prefix and rotates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedNamer {
    prefix: String,
}

impl VersionedNamer {
    /// The prefix may not contain `.` or a path separator: the first `.` of a
    /// version name must be the one before the extension.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(Error::validation("rotation prefix must not be empty"));
        }
        if prefix.contains('.') || prefix.contains('/') || prefix.contains('\\') {
            return Err(Error::validation(format!(
                "rotation prefix '{}' must not contain '.' or path separators",
                prefix
            )));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>_0000`
    pub fn sentinel(&self) -> String {
        format!("{}_0000", self.prefix)
    }

    /// Name for the version at `at`. `day` (1-31) replaces the two
    /// day-of-month digits of the date token.
    pub fn derive_name(
        &self,
        day: Option<u32>,
        include_time: bool,
        at: &NaiveDateTime,
    ) -> Result<String> {
        let day = match day {
            Some(day) if (1..=31).contains(&day) => day,
            Some(day) => {
                return Err(Error::validation(format!(
                    "day must be between 1 and 31, got {}",
                    day
                )))
            }
            None => at.day(),
        };

        let (date, time) = stamp::date_time_tokens(at);
        let mut name = format!("{}_{}{:02}", self.prefix, &date[..date.len() - 2], day);
        if include_time {
            name.push('_');
            name.push_str(&time);
        }
        Ok(format!("{}.{}", name, TRACKED_EXTENSION))
    }

    /// Decides whether `proposed` should be created from the latest existing
    /// version in `listing`.
    ///
    /// No rotation when nothing but the sentinel matches the prefix, when the
    /// latest version already is `proposed`, or when `proposed` exists.
    pub fn plan_rotation<S: AsRef<str>>(&self, listing: &[S], proposed: &str) -> Option<Rotation> {
        let sentinel = self.sentinel();
        let latest = listing
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| name.starts_with(self.prefix.as_str()))
            .fold(sentinel.as_str(), |latest, name| latest.max(name));

        if latest == sentinel {
            tracing::debug!("No version of {} found, nothing to rotate", self.prefix);
            return None;
        }
        if latest == proposed || listing.iter().any(|name| name.as_ref() == proposed) {
            tracing::debug!("{} is already current", proposed);
            return None;
        }

        Some(Rotation {
            from: latest.to_string(),
            to: proposed.to_string(),
        })
    }

    /// Copies the latest version in `dir` to the name derived for `at`, when
    /// a rotation is warranted.
    pub fn rotate(
        &self,
        dir: &Path,
        day: Option<u32>,
        at: &NaiveDateTime,
    ) -> Result<Option<Rotation>> {
        let proposed = self.derive_name(day, false, at)?;

        let listing: Vec<String> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();

        let Some(rotation) = self.plan_rotation(listing.as_slice(), &proposed) else {
            return Ok(None);
        };

        fs::copy(dir.join(&rotation.from), dir.join(&rotation.to))?;
        tracing::info!("Created new file {} from {}", rotation.to, rotation.from);
        Ok(Some(rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_derive_name_day_override() {
        let namer = VersionedNamer::new("index").unwrap();
        let name = namer.derive_name(Some(5), false, &at(2026, 10, 17, 8, 0)).unwrap();
        assert_eq!(name, "index_20261005.wiki");
        assert!(name.ends_with("05.wiki"));
    }

    #[test]
    fn test_derive_name_defaults_to_today() {
        let namer = VersionedNamer::new("newton").unwrap();
        assert_eq!(
            namer.derive_name(None, false, &at(2026, 3, 9, 8, 0)).unwrap(),
            "newton_20260309.wiki"
        );
        assert_eq!(
            namer.derive_name(None, true, &at(2026, 3, 9, 7, 4)).unwrap(),
            "newton_20260309_0704.wiki"
        );
    }

    #[test]
    fn test_derive_name_rejects_bad_day() {
        let namer = VersionedNamer::new("index").unwrap();
        assert!(namer.derive_name(Some(0), false, &at(2026, 1, 1, 0, 0)).is_err());
        assert!(namer.derive_name(Some(32), false, &at(2026, 1, 1, 0, 0)).is_err());
    }

    #[test]
    fn test_prefix_validation() {
        assert!(VersionedNamer::new("").is_err());
        assert!(VersionedNamer::new("index.wiki").is_err());
        assert!(VersionedNamer::new("wiki/index").is_err());
    }

    #[test]
    fn test_names_sort_chronologically() {
        let namer = VersionedNamer::new("index").unwrap();
        let sep = namer.derive_name(None, false, &at(2026, 9, 30, 0, 0)).unwrap();
        let oct = namer.derive_name(None, false, &at(2026, 10, 1, 0, 0)).unwrap();
        assert!(sep < oct);
        assert!(namer.sentinel() < sep);
    }

    #[test]
    fn test_plan_rotation_from_latest() {
        let namer = VersionedNamer::new("index").unwrap();
        let listing = ["index_0000", "index_0412", "index_0301", "other.wiki"];
        assert_eq!(
            namer.plan_rotation(&listing, "index_0500"),
            Some(Rotation {
                from: "index_0412".to_string(),
                to: "index_0500".to_string()
            })
        );
    }

    #[test]
    fn test_plan_rotation_sentinel_only() {
        let namer = VersionedNamer::new("index").unwrap();
        assert_eq!(namer.plan_rotation(&["index_0000"], "index_0500"), None);
        assert_eq!(namer.plan_rotation::<&str>(&[], "index_0500"), None);
    }

    #[test]
    fn test_plan_rotation_already_present() {
        let namer = VersionedNamer::new("index").unwrap();
        assert_eq!(
            namer.plan_rotation(&["index_0412", "index_0500"], "index_0500"),
            None
        );
        assert_eq!(namer.plan_rotation(&["index_0500"], "index_0500"), None);
    }

    #[test]
    fn test_rotate_copies_latest() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("newton_20261015.wiki"), "older").unwrap();
        fs::write(temp.path().join("newton_20261016.wiki"), "latest").unwrap();
        fs::write(temp.path().join("index.wiki"), "index").unwrap();

        let namer = VersionedNamer::new("newton").unwrap();
        let rotation = namer
            .rotate(temp.path(), None, &at(2026, 10, 17, 6, 0))
            .unwrap()
            .unwrap();

        assert_eq!(rotation.from, "newton_20261016.wiki");
        assert_eq!(rotation.to, "newton_20261017.wiki");
        assert_eq!(
            fs::read_to_string(temp.path().join("newton_20261017.wiki")).unwrap(),
            "latest"
        );

        // Running again the same day does nothing
        let again = namer.rotate(temp.path(), None, &at(2026, 10, 17, 9, 0)).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn test_derive_name_matches_timestamped_name() {
        let namer = VersionedNamer::new("index").unwrap();
        let at = at(2026, 10, 17, 6, 30);
        assert_eq!(
            namer.derive_name(None, true, &at).unwrap(),
            stamp::timestamped_name("index.wiki", true, &at)
        );
    }

    #[test]
    fn test_monthly_rotation_keeps_one_page_per_month() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("newton_20260901.wiki"), "september").unwrap();
        let namer = VersionedNamer::new("newton").unwrap();

        let first = namer
            .rotate(temp.path(), Some(1), &at(2026, 10, 17, 6, 0))
            .unwrap();
        assert_eq!(
            first,
            Some(Rotation {
                from: "newton_20260901.wiki".to_string(),
                to: "newton_20261001.wiki".to_string()
            })
        );

        // Later runs in the same month find the page already in place
        assert_eq!(namer.rotate(temp.path(), Some(1), &at(2026, 10, 18, 6, 0)).unwrap(), None);
        assert_eq!(namer.rotate(temp.path(), Some(1), &at(2026, 10, 31, 6, 0)).unwrap(), None);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_rotate_without_prior_version() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.wiki"), "index").unwrap();

        let namer = VersionedNamer::new("newton").unwrap();
        let rotation = namer.rotate(temp.path(), Some(1), &at(2026, 10, 17, 6, 0)).unwrap();
        assert_eq!(rotation, None);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
