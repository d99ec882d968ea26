//! Date and time tokens used in generated file names.
//!
//! Every token is fixed-width and zero-padded (4-digit year, 2-digit month,
//! day, hour and minute) so that names embedding them sort chronologically
//! under plain string comparison.

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

/// Compact date token, e.g. `20261017`.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Compact time token, e.g. `0905`.
pub const TIME_FORMAT: &str = "%H%M";

/// Timestamp format used by log sinks.
pub const LOG_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Current local wall-clock time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Returns `(YYYYMMDD, HHMM)` for the given instant.
pub fn date_time_tokens(at: &NaiveDateTime) -> (String, String) {
    (
        at.format(DATE_FORMAT).to_string(),
        at.format(TIME_FORMAT).to_string(),
    )
}

/// `YYYYMMDD` or `YYYYMMDD_HHMM`.
pub fn stamp(at: &NaiveDateTime, include_time: bool) -> String {
    let (date, time) = date_time_tokens(at);
    if include_time {
        format!("{}_{}", date, time)
    } else {
        date
    }
}

/// Inserts a date (and optionally time) token before the first `.` of a file name.
///
/// `index.wiki` becomes `index_20261017.wiki`; `notes.tar.gz` keeps its full
/// multi-part extension. Names without a usable stem (`Makefile`, `.vimrc`)
/// get the token appended instead.
pub fn timestamped_name(name: &str, include_time: bool, at: &NaiveDateTime) -> String {
    let token = stamp(at, include_time);
    match name.split_once('.') {
        Some((stem, rest)) if !stem.is_empty() => format!("{}_{}.{}", stem, token, rest),
        _ => format!("{}_{}", name, token),
    }
}

/// Applies [`timestamped_name`] to the final component of a path.
pub fn timestamped_path(path: &Path, include_time: bool, at: &NaiveDateTime) -> PathBuf {
    match path.file_name() {
        Some(name) => {
            let name = timestamped_name(&name.to_string_lossy(), include_time, at);
            path.with_file_name(name)
        }
        None => path.to_path_buf(),
    }
}
